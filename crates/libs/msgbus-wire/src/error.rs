use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("short id too long (max {} bytes): {0:?}", crate::ShortId::CAPACITY)]
    ShortIdTooLong(String),
    #[error("short id is not ascii: {0:?}")]
    ShortIdNotAscii(String),
    #[error("invalid message priority byte: {0}")]
    InvalidPriority(u8),
    #[error("invalid crypto flags byte: {0}")]
    InvalidCryptoFlags(u8),
    #[error("frame too short: got {got} bytes, need at least {need}")]
    FrameTooShort { got: usize, need: usize },
    #[error("content codec error: {0}")]
    Content(String),
}
