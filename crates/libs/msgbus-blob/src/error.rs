use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob payload truncated: need at least {need} bytes, got {got}")]
    PayloadTooShort { need: usize, got: usize },

    #[error("blob fragment range invalid: offset={offset} len={len} total_size={total_size}")]
    InvalidFragmentRange {
        offset: i64,
        len: usize,
        total_size: i64,
    },

    #[error("blob total_size {total_size} exceeds configured cap {cap}")]
    SizeCapExceeded { total_size: i64, cap: i64 },
}
