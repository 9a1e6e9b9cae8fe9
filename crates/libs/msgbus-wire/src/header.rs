use crate::{AgeQuarterSeconds, CryptoFlags, EndpointId, HopCount, MessageId, MessagePriority, SequenceNo, MAX_HOP_COUNT};

/// Every field that rides along with a message, in the order it is packed
/// onto the wire. `msg_id` corresponds to the wire's
/// `class_id`/`method_id` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub msg_id: MessageId,
    pub source_id: EndpointId,
    pub target_id: EndpointId,
    pub serializer_id: u64,
    pub sequence_no: SequenceNo,
    pub hop_count: HopCount,
    pub age_quarter_seconds: AgeQuarterSeconds,
    pub priority: MessagePriority,
    pub crypto_flags: CryptoFlags,
}

impl MessageHeader {
    pub fn new(msg_id: MessageId, source_id: EndpointId, target_id: EndpointId) -> Self {
        MessageHeader {
            msg_id,
            source_id,
            target_id,
            serializer_id: 0,
            sequence_no: 0,
            hop_count: 0,
            age_quarter_seconds: 0,
            priority: MessagePriority::Normal,
            crypto_flags: CryptoFlags::empty(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.target_id.is_broadcast()
    }

    /// Increments the hop count and reports whether the message should now
    /// be dropped.
    #[must_use]
    pub fn bump_hop_count(&mut self) -> bool {
        self.hop_count = self.hop_count.saturating_add(1);
        self.hop_count >= MAX_HOP_COUNT
    }

    pub fn hop_count_exceeded(&self) -> bool {
        self.hop_count >= MAX_HOP_COUNT
    }

    /// Adds router dwell time (in quarter-seconds) to the age counter,
    /// clamping at the field's type maximum rather than wrapping.
    pub fn add_age(&mut self, delta: AgeQuarterSeconds) {
        self.age_quarter_seconds = self.age_quarter_seconds.saturating_add(delta);
    }

    pub fn is_stale(&self) -> bool {
        self.priority.is_stale(self.age_quarter_seconds)
    }
}
