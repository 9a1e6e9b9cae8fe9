use std::collections::HashMap;
use std::time::{Duration, Instant};

use msgbus_blob::{BlobManipulator, BlobManipulatorConfig};
use msgbus_transport::{Acceptor, Connection};
use msgbus_wire::{EndpointId, MessageHeader, MessageId, MessagePriority, MessageView, ProcessInstanceId};

use crate::config::RouterConfig;
use crate::endpoint_info::EndpointInfo;
use crate::ids::ControlIds;
use crate::node::RoutedNode;
use crate::parent::ParentLink;
use crate::pending::PendingConnection;
use crate::registry::RouterRegistry;
use crate::stats::{AgeTracker, RouterStats};

/// The concurrent, multi-connection switching fabric. Owns every
/// connection it has adopted; nothing outlives it by reference.
pub struct Router {
    pub(crate) config: RouterConfig,
    pub(crate) instance_id: ProcessInstanceId,
    pub(crate) ids: ControlIds,
    pub(crate) id_sequence: u64,
    pub(crate) acceptors: Vec<Box<dyn Acceptor>>,
    pub(crate) pending: Vec<PendingConnection>,
    pub(crate) nodes: HashMap<EndpointId, RoutedNode>,
    pub(crate) endpoint_infos: HashMap<EndpointId, EndpointInfo>,
    pub(crate) recently_disconnected: HashMap<EndpointId, Instant>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) blob: BlobManipulator,
    pub(crate) endpoint_certs: HashMap<EndpointId, Vec<u8>>,
    pub(crate) own_certificate: Option<Vec<u8>>,
    pub(crate) registry: RouterRegistry,
    pub(crate) stats: RouterStats,
    pub(crate) age_tracker: AgeTracker,
    pub(crate) last_pass: Instant,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let ids = ControlIds::default();
        let blob = BlobManipulator::new(
            ids.blob_fragment,
            ids.blob_resend,
            ids.blob_prepare,
            BlobManipulatorConfig {
                size_cap_bytes: config.blob_size_cap_bytes,
            },
        );
        let id_sequence = config.base() + 1;
        Router {
            config,
            instance_id: ProcessInstanceId(std::process::id()),
            ids,
            id_sequence,
            acceptors: Vec::new(),
            pending: Vec::new(),
            nodes: HashMap::new(),
            endpoint_infos: HashMap::new(),
            recently_disconnected: HashMap::new(),
            parent: None,
            blob,
            endpoint_certs: HashMap::new(),
            own_certificate: None,
            registry: RouterRegistry::new(),
            stats: RouterStats::default(),
            age_tracker: AgeTracker::default(),
            last_pass: Instant::now(),
        }
    }

    pub fn self_id(&self) -> EndpointId {
        self.config.self_id()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_own_certificate(&mut self, pem: Vec<u8>) {
        self.own_certificate = Some(pem);
    }

    /// Acceptors are attached before the router starts and never removed
    /// thereafter.
    pub fn add_acceptor(&mut self, acceptor: Box<dyn Acceptor>) {
        self.acceptors.push(acceptor);
    }

    pub fn attach_parent(&mut self, connection: Box<dyn Connection>) -> Result<(), crate::error::RouterError> {
        if self.parent.is_some() {
            return Err(crate::error::RouterError::ParentAlreadyAttached);
        }
        self.parent = Some(ParentLink::new(connection));
        Ok(())
    }

    /// Scans forward from the last-issued id through the configured
    /// range, wrapping once, and returns the first id not already in use
    /// by an adopted node, a pending connection, or a recently
    /// disconnected one. Returns `None` (: "returning 0 (failure)")
    /// if a full cycle finds nothing free.
    pub(crate) fn next_id(&mut self) -> Option<EndpointId> {
        let (base, end) = self.config.id_range();
        if end <= base + 1 {
            return None;
        }
        let span = end - (base + 1);
        for step in 0..span {
            let candidate = base + 1 + (self.id_sequence - (base + 1) + step) % span;
            let id = EndpointId(candidate);
            let in_use = self.nodes.contains_key(&id)
                || self.pending.iter().any(|p| p.id == Some(id))
                || self.recently_disconnected.contains_key(&id);
            if !in_use {
                self.id_sequence = candidate + 1;
                return Some(id);
            }
        }
        None
    }

    /// Builds a header with this router's instance conventions and hands
    /// it straight to a single node's connection — used by control
    /// handlers that answer a peer directly rather than routing a reply
    /// through the general forwarding path.
    pub(crate) fn reply_direct(
        &mut self,
        to: EndpointId,
        msg_id: MessageId,
        target: EndpointId,
        content: &[u8],
    ) -> bool {
        let mut header = MessageHeader::new(msg_id, self.self_id(), target);
        header.priority = MessagePriority::High;
        let view = MessageView::new(&header, content);
        if let Some(node) = self.nodes.get_mut(&to) {
            return node.connection.send(&msg_id, &view);
        }
        if let Some(pending) = self.pending.iter_mut().find(|p| p.id == Some(to)) {
            return pending.connection.send(&msg_id, &view);
        }
        false
    }

    pub(crate) fn broadcast_control(&mut self, msg_id: MessageId, content: &[u8]) {
        let mut header = MessageHeader::new(msg_id, self.self_id(), EndpointId::BROADCAST);
        header.priority = MessagePriority::High;
        for node in self.nodes.values_mut() {
            let view = MessageView::new(&header, content);
            let _ = node.connection.send(&msg_id, &view);
        }
        if let Some(parent) = self.parent.as_mut() {
            let view = MessageView::new(&header, content);
            let _ = parent.connection.send(&msg_id, &view);
        }
    }

    /// One cooperative tick: pump acceptors/pending admission, maintenance
    /// sweeps, and message routing, up to `max_passes` times while there
    /// is still work to do.
    pub fn do_work(&mut self, max_passes: usize) -> bool {
        let mut any = false;
        for _ in 0..max_passes.max(1) {
            let maintenance = self.do_maintenance();
            let routing = if self.nodes.len() > self.config.worker_threshold {
                self.route_pass_parallel()
            } else {
                self.route_pass_serial()
            };
            any |= maintenance || routing;
            if !maintenance && !routing {
                break;
            }
        }
        any
    }

    /// `do_maintenance()`: stats, this router's own BLOB
    /// progress, pending-connection pump, acceptor pump, timeout sweeps.
    pub fn do_maintenance(&mut self) -> bool {
        let mut any = false;
        any |= self.update_stats();
        any |= self.process_own_blobs();
        any |= self.handle_accept();
        any |= self.handle_pending();
        any |= self.sweep_timeouts();
        any
    }

    fn update_stats(&mut self) -> bool {
        let now = Instant::now();
        let Some(window) = self.age_tracker.maybe_window_stats(now) else {
            return false;
        };
        self.stats.messages_per_second = window.messages_per_second;
        if let Some(avg_ms) = window.flow_broadcast_ms {
            let payload = avg_ms.to_be_bytes().to_vec();
            self.broadcast_control(self.ids.msg_flow_inf, &payload);
        }
        true
    }

    /// Outgoing/incoming BLOB fragmentation for BLOBs *this* router
    /// pushed or expects — not the
    /// BLOB fragments it forwards on behalf of others, which flow through
    /// ordinary routing like any other message.
    fn process_own_blobs(&mut self) -> bool {
        let mut nodes = std::mem::take(&mut self.nodes);
        let mut parent = self.parent.take();
        let max_size = nodes
            .values()
            .map(|n| n.connection.max_data_size())
            .min()
            .unwrap_or(msgbus_transport::MIN_CONNECTION_DATA_SIZE);

        let mut send = |msg_id: &MessageId, view: &MessageView<'_>| -> bool {
            let target = view.header.target_id;
            if let Some(node) = nodes.get_mut(&target) {
                return node.connection.send(msg_id, view);
            }
            if let Some(parent) = parent.as_mut() {
                return parent.connection.send(msg_id, view);
            }
            false
        };
        let sent = self.blob.process_outgoing(&mut send, max_size, 4);
        let maintained = self.blob.do_maintenance(&mut send, max_size);
        drop(send);

        self.nodes = nodes;
        self.parent = parent;
        sent || maintained
    }

    pub(crate) fn sweep_timeouts(&mut self) -> bool {
        let now = Instant::now();
        let mut any = false;

        let before = self.pending.len();
        for pending in &mut self.pending {
            if pending.is_too_old(self.config.pending_timeout) {
                log::warn!("dropping pending connection past admission timeout");
            }
        }
        self.pending.retain_mut(|p| {
            if p.is_too_old(self.config.pending_timeout) {
                p.connection.cleanup();
                false
            } else {
                true
            }
        });
        any |= self.pending.len() != before;

        self.endpoint_infos
            .retain(|_, info| !info.is_outdated(self.config.endpoint_info_timeout));

        let disconnect_ids: Vec<EndpointId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.do_disconnect || !n.connection.is_usable())
            .map(|(&id, _)| id)
            .collect();
        for id in disconnect_ids {
            if let Some(mut node) = self.nodes.remove(&id) {
                node.connection.cleanup();
                self.recently_disconnected.insert(id, now);
                self.endpoint_infos.remove(&id);
                any = true;
            }
        }

        self.recently_disconnected
            .retain(|_, at| now.duration_since(*at) <= self.config.recently_disconnected_ttl);

        if before != self.pending.len() {
            any = true;
        }
        any
    }

    /// Graceful shutdown: broadcast `byeByeRutr`, drain for
    /// about a second, then `cleanup()` every connection exactly once.
    pub fn finish(&mut self) {
        self.broadcast_control(self.ids.bye_bye_rutr, &[]);
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if !self.do_work(1) {
                break;
            }
        }
        for node in self.nodes.values_mut() {
            node.connection.cleanup();
        }
        for pending in &mut self.pending {
            pending.connection.cleanup();
        }
        if let Some(parent) = self.parent.as_mut() {
            parent.connection.cleanup();
        }
    }

    pub(crate) fn dwell(&mut self) -> msgbus_wire::AgeQuarterSeconds {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_pass);
        self.last_pass = now;
        let quarters = (elapsed.as_millis() / 250).min(i8::MAX as u128);
        quarters as msgbus_wire::AgeQuarterSeconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_allocation_never_yields_base_and_is_unique() {
        let mut router = Router::new(RouterConfig {
            id_major: 0,
            id_minor: 10,
            id_count: 3,
            ..RouterConfig::default()
        });
        let a = router.next_id().unwrap();
        router.nodes.insert(a, RoutedNode::new(Box::new(dummy_conn()), false));
        let b = router.next_id().unwrap();
        assert_ne!(a, b);
        assert_ne!(a, router.self_id());
        assert_ne!(b, router.self_id());
    }

    fn dummy_conn() -> msgbus_transport::InProcessConnection {
        msgbus_transport::InProcessConnection::pair(1024).0
    }
}
