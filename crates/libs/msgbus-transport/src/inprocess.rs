use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Mutex;

use msgbus_wire::{decode_frame_owned, encode_frame, ConnectionKind, MessageId, MessageView};

use crate::connection::{
    Connection, ConnectionStatistics, ConnectionTypeId, IN_PROCESS_CONNECTION_TYPE_ID,
};

/// One end of an in-process, channel-backed [`Connection`]. Frames are
/// encoded exactly as they would be for a byte-stream transport, so code
/// exercised against this implementation behaves the same as it would
/// against a real socket; only the carrier is an `mpsc` channel instead of
/// a file descriptor.
pub struct InProcessConnection {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    max_data_size: usize,
    stats: ConnectionStatistics,
    peer_gone: bool,
    cleaned_up: bool,
}

impl InProcessConnection {
    /// Builds a connected pair, as if a router had accepted a loopback
    /// connection from an endpoint in the same process.
    pub fn pair(max_data_size: usize) -> (InProcessConnection, InProcessConnection) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        let a = InProcessConnection {
            tx: tx_a,
            rx: rx_a,
            max_data_size,
            stats: ConnectionStatistics::default(),
            peer_gone: false,
            cleaned_up: false,
        };
        let b = InProcessConnection {
            tx: tx_b,
            rx: rx_b,
            max_data_size,
            stats: ConnectionStatistics::default(),
            peer_gone: false,
            cleaned_up: false,
        };
        (a, b)
    }
}

impl Connection for InProcessConnection {
    fn send(&mut self, _msg_id: &MessageId, msg: &MessageView<'_>) -> bool {
        if self.cleaned_up || !self.is_usable() {
            return false;
        }
        let frame = encode_frame(msg.header, msg.content);
        if frame.len() > self.max_data_size {
            return false;
        }
        match self.tx.send(frame) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += msg.content.len() as u64;
                true
            }
            Err(_) => {
                self.peer_gone = true;
                false
            }
        }
    }

    fn fetch_messages(
        &mut self,
        handler: &mut dyn FnMut(
            &MessageId,
            msgbus_wire::AgeQuarterSeconds,
            &MessageView<'_>,
        ) -> bool,
    ) -> bool {
        let mut delivered_any = false;
        loop {
            match self.rx.try_recv() {
                Ok(frame) => {
                    let stored = match decode_frame_owned(&frame) {
                        Ok(stored) => stored,
                        Err(err) => {
                            log::warn!("dropping malformed in-process frame: {err}");
                            continue;
                        }
                    };
                    self.stats.messages_received += 1;
                    self.stats.bytes_received += stored.content.len() as u64;
                    let view = stored.view();
                    handler(&stored.header.msg_id, stored.header.age_quarter_seconds, &view);
                    delivered_any = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.peer_gone = true;
                    break;
                }
            }
        }
        delivered_any
    }

    fn update(&mut self) -> bool {
        false
    }

    fn max_data_size(&self) -> usize {
        self.max_data_size
    }

    fn is_usable(&self) -> bool {
        !self.peer_gone && !self.cleaned_up
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::InProcess
    }

    fn type_id(&self) -> ConnectionTypeId {
        IN_PROCESS_CONNECTION_TYPE_ID
    }

    fn query_statistics(&self, out: &mut ConnectionStatistics) {
        *out = self.stats;
    }

    fn cleanup(&mut self) {
        self.cleaned_up = true;
    }
}

/// Registration point shared between an [`InProcessAcceptor`] and whatever
/// creates in-process client connections (tests, or same-process endpoint
/// wiring). `connect` builds a loopback pair, keeps one half for itself and
/// hands the other to the acceptor's queue.
pub struct InProcessRegistry {
    pending: Mutex<Vec<Box<dyn Connection>>>,
    max_data_size: usize,
}

impl InProcessRegistry {
    pub fn new(max_data_size: usize) -> Self {
        InProcessRegistry {
            pending: Mutex::new(Vec::new()),
            max_data_size,
        }
    }

    /// Creates a new loopback connection, queues one half for the
    /// acceptor to pick up, and returns the other half to the caller.
    pub fn connect(&self) -> InProcessConnection {
        let (client, server) = InProcessConnection::pair(self.max_data_size);
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(Box::new(server));
        }
        client
    }
}

/// Polls an [`InProcessRegistry`] for connections queued by `connect`.
pub struct InProcessAcceptor<'a> {
    registry: &'a InProcessRegistry,
}

impl<'a> InProcessAcceptor<'a> {
    pub fn new(registry: &'a InProcessRegistry) -> Self {
        InProcessAcceptor { registry }
    }
}

impl crate::connection::Acceptor for InProcessAcceptor<'_> {
    fn update(&mut self) -> bool {
        self.registry
            .pending
            .lock()
            .map(|p| !p.is_empty())
            .unwrap_or(false)
    }

    fn process_accepted(&mut self, handler: &mut dyn FnMut(Box<dyn Connection>)) {
        let accepted: Vec<Box<dyn Connection>> = match self.registry.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => Vec::new(),
        };
        for conn in accepted {
            handler(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgbus_wire::{EndpointId, MessageHeader, MessagePriority};

    fn header(msg_id: MessageId) -> MessageHeader {
        MessageHeader::new(msg_id, EndpointId(1), EndpointId(2))
    }

    #[test]
    fn send_and_fetch_roundtrips() {
        let (mut a, mut b) = InProcessConnection::pair(4096);
        let msg_id = MessageId::new("app", "ping").unwrap();
        let h = header(msg_id.clone());
        let view = MessageView::new(&h, b"hello");
        assert!(a.send(&msg_id, &view));

        let mut received = None;
        b.fetch_messages(&mut |id, _age, view| {
            received = Some((id.clone(), view.content.to_vec()));
            true
        });
        let (id, content) = received.expect("message delivered");
        assert_eq!(id, msg_id);
        assert_eq!(content, b"hello");
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let (mut a, _b) = InProcessConnection::pair(16);
        let msg_id = MessageId::new("app", "ping").unwrap();
        let h = header(msg_id.clone());
        let view = MessageView::new(&h, &[0u8; 64]);
        assert!(!a.send(&msg_id, &view));
    }

    #[test]
    fn dropped_peer_is_reported_unusable() {
        let (mut a, b) = InProcessConnection::pair(4096);
        drop(b);
        let msg_id = MessageId::new("app", "ping").unwrap();
        let h = header(msg_id.clone());
        let view = MessageView::new(&h, b"x");
        assert!(!a.send(&msg_id, &view));
        assert!(!a.is_usable());
    }

    #[test]
    fn cleanup_is_idempotent_and_marks_unusable() {
        let (mut a, _b) = InProcessConnection::pair(4096);
        a.cleanup();
        a.cleanup();
        assert!(!a.is_usable());
    }

    #[test]
    fn registry_connect_is_picked_up_by_acceptor() {
        let registry = InProcessRegistry::new(4096);
        let _client = registry.connect();
        let mut acceptor = InProcessAcceptor::new(&registry);
        assert!(acceptor.update());
        let mut accepted = Vec::new();
        acceptor.process_accepted(&mut |conn| accepted.push(conn));
        assert_eq!(accepted.len(), 1);
        assert!(!acceptor.update());
    }

    #[test]
    fn message_priority_default_roundtrips_through_frame() {
        let (mut a, mut b) = InProcessConnection::pair(4096);
        let msg_id = MessageId::new("app", "ping").unwrap();
        let mut h = header(msg_id.clone());
        h.priority = MessagePriority::High;
        let view = MessageView::new(&h, b"x");
        a.send(&msg_id, &view);
        let mut seen_priority = None;
        b.fetch_messages(&mut |_id, _age, view| {
            seen_priority = Some(view.header.priority);
            true
        });
        assert_eq!(seen_priority, Some(MessagePriority::High));
    }
}
