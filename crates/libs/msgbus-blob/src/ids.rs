/// Sender-scoped identifier for an outgoing BLOB transfer. Assigned by the
/// manipulator that owns the source-IO, monotonically and wrapping, never
/// reused while a transfer with that id is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceBlobId(pub u32);

/// Receiver-scoped identifier for an incoming BLOB transfer, assigned once
/// a receive entry is created and echoed back to the sender so it can be
/// carried on later fragment/resend frames without a lookup on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetBlobId(pub u32);

/// Wrapping monotonic counter shared by both id kinds.
#[derive(Debug, Default)]
pub struct BlobIdSequence(u32);

impl BlobIdSequence {
    pub fn next_source(&mut self) -> SourceBlobId {
        let id = SourceBlobId(self.0);
        self.0 = self.0.wrapping_add(1);
        id
    }

    pub fn next_target(&mut self) -> TargetBlobId {
        let id = TargetBlobId(self.0);
        self.0 = self.0.wrapping_add(1);
        id
    }
}
