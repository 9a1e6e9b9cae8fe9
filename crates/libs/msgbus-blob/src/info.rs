use msgbus_wire::{EndpointId, MessageId};

/// Summary handed to `TargetBlobIo::handle_finished` once a transfer
/// completes, describing what was received and from whom.
#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub msg_id: MessageId,
    pub source_id: EndpointId,
    pub total_size: i64,
}

/// Progress report from a streaming `SourceBlobIo::prepare` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareStatus {
    pub progress: f32,
    pub finished: bool,
}
