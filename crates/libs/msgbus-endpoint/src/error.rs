use thiserror::Error;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("endpoint already has a connection attached")]
    ConnectionAlreadyAttached,
    #[error("endpoint has no id assigned yet")]
    NoIdAssigned,
    #[error("content codec error: {0}")]
    Wire(#[from] msgbus_wire::WireError),
}
