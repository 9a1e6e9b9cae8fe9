use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no free endpoint id left in the configured range")]
    IdRangeExhausted,
    #[error("router already has a parent link attached")]
    ParentAlreadyAttached,
    #[error("frame header failed to decode: {0}")]
    Wire(#[from] msgbus_wire::WireError),
    #[error("blob payload error: {0}")]
    Blob(#[from] msgbus_blob::BlobError),
}
