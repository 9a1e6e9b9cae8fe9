use msgbus_wire::{AgeQuarterSeconds, ConnectionKind, MessageId, MessageView};

/// Identifies the concrete connection implementation behind a `dyn
/// Connection`, so a router can special-case a transport (e.g. to skip
/// re-encoding a frame it already holds encoded) without downcasting.
pub type ConnectionTypeId = u64;

pub const IN_PROCESS_CONNECTION_TYPE_ID: ConnectionTypeId = 1;

/// Point-in-time counters for a connection, filled in by
/// [`Connection::query_statistics`]. Mirrors the plain-counter-struct shape
/// used for router-wide stats.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionStatistics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// One side of a bidirectional, message-framed link between two nodes of
/// the bus (two endpoints, an endpoint and a router, or two routers).
///
/// A `Connection` never blocks and never spawns its own thread: whatever
/// owns it is expected to call `update` and `fetch_messages` periodically
/// from a cooperative work loop.
pub trait Connection: Send {
    /// Enqueues `msg` for delivery, tagged with `msg_id`. Returns `false`
    /// if the connection could not accept it right now (e.g. outbound
    /// buffer full or the peer is gone) — the caller is expected to retry.
    fn send(&mut self, msg_id: &MessageId, msg: &MessageView<'_>) -> bool;

    /// Delivers every message currently available without blocking. The
    /// handler's return value tells the connection whether the message was
    /// accepted; a connection may use this to decide whether to keep
    /// offering further buffered messages in the same batch, but it must
    /// not skip messages the handler rejected by `false` on its next call.
    /// Returns whether anything was delivered.
    fn fetch_messages(
        &mut self,
        handler: &mut dyn FnMut(&MessageId, AgeQuarterSeconds, &MessageView<'_>) -> bool,
    ) -> bool;

    /// Drives internal bookkeeping (flushing buffers, expiring stale
    /// state). Returns whether it did anything useful this call.
    fn update(&mut self) -> bool;

    /// Largest single frame this connection can carry. Must be at least
    /// `MIN_CONNECTION_DATA_SIZE`.
    fn max_data_size(&self) -> usize;

    /// Whether the connection is still usable for sending or receiving.
    fn is_usable(&self) -> bool;

    fn kind(&self) -> ConnectionKind;

    fn type_id(&self) -> ConnectionTypeId;

    fn query_statistics(&self, out: &mut ConnectionStatistics);

    /// Releases any held resources. Implementations must tolerate being
    /// called more than once.
    fn cleanup(&mut self);
}

/// Produces newly accepted [`Connection`]s, e.g. from a listening socket or
/// (for the in-process transport) a registration queue.
pub trait Acceptor: Send {
    /// Polls for new incoming connections. Returns whether any were found.
    fn update(&mut self) -> bool;

    /// Hands every connection accepted since the last call to `handler`.
    fn process_accepted(&mut self, handler: &mut dyn FnMut(Box<dyn Connection>));
}

/// Smallest `max_data_size` a connection is allowed to advertise: large
/// enough for the fixed 30-byte BLOB fragment inner header plus a
/// non-trivial chunk of payload.
pub const MIN_CONNECTION_DATA_SIZE: usize = 48;
