use msgbus_storage::PriorityQueue;

/// Per-message-id receive state: how many times `subscribe` has been
/// called for this id (balanced against `unsubscribe`) and the queue of
/// messages of this id waiting to be processed.
#[derive(Default)]
pub struct IncomingState {
    pub subscription_count: usize,
    pub queue: PriorityQueue,
}
