use std::collections::HashMap;

use msgbus_transport::Connection;
use msgbus_wire::{EndpointId, MessageHeader, MessageId, MessageView};

use crate::node::RoutedNode;
use crate::parent::ParentLink;
use crate::stats::{AgeTracker, RouterStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    HopCountExceeded,
    Stale,
    RecentlyDisconnected,
}

/// Implements `route_message`. `incoming_id` is
/// `EndpointId::BROADCAST` when the message originated at the router
/// itself (e.g. a control reply) rather than arriving from an adopted
/// node. `dwell` is the router's own elapsed-since-last-pass time, added
/// to the header's age before the staleness check.
#[allow(clippy::too_many_arguments)]
pub fn route_message(
    nodes: &mut HashMap<EndpointId, RoutedNode>,
    parent: &mut Option<ParentLink>,
    recently_disconnected: &HashMap<EndpointId, std::time::Instant>,
    self_id: EndpointId,
    incoming_id: EndpointId,
    from_parent: bool,
    msg_id: &MessageId,
    header: &mut MessageHeader,
    content: &[u8],
    dwell: msgbus_wire::AgeQuarterSeconds,
    stats: &mut RouterStats,
    age_tracker: &mut AgeTracker,
) -> Result<(), DropReason> {
    if header.bump_hop_count() {
        stats.dropped_messages += 1;
        return Err(DropReason::HopCountExceeded);
    }

    header.add_age(dwell);
    if header.is_stale() {
        stats.dropped_messages += 1;
        return Err(DropReason::Stale);
    }

    age_tracker.record(header.age_quarter_seconds);

    if header.is_broadcast() {
        for (&id, node) in nodes.iter_mut() {
            if id == incoming_id {
                continue;
            }
            if !node.is_allowed(msg_id) {
                continue;
            }
            let view = MessageView::new(header, content);
            if node.connection.send(msg_id, &view) {
                stats.forwarded_messages += 1;
                stats.sent_messages += 1;
            }
        }
        if !from_parent {
            if let Some(parent) = parent.as_mut() {
                let view = MessageView::new(header, content);
                if parent.connection.send(msg_id, &view) {
                    stats.forwarded_messages += 1;
                    stats.sent_messages += 1;
                }
            }
        }
        return Ok(());
    }

    let target_id = header.target_id;
    if recently_disconnected.contains_key(&target_id) {
        stats.dropped_messages += 1;
        return Err(DropReason::RecentlyDisconnected);
    }

    if target_id == self_id {
        if let Some(parent) = parent.as_mut() {
            let view = MessageView::new(header, content);
            if parent.connection.send(msg_id, &view) {
                stats.forwarded_messages += 1;
                stats.sent_messages += 1;
            }
        }
        return Ok(());
    }

    if let Some(node) = nodes.get_mut(&target_id) {
        if node.is_allowed(msg_id) {
            let view = MessageView::new(header, content);
            if node.connection.send(msg_id, &view) {
                stats.forwarded_messages += 1;
                stats.sent_messages += 1;
            }
        }
        return Ok(());
    }

    // No direct neighbor owns this id: try every peer that might itself
    // be a router able to route it further.
    for (&id, node) in nodes.iter_mut() {
        if id == incoming_id || !node.maybe_router {
            continue;
        }
        if !node.is_allowed(msg_id) {
            continue;
        }
        let view = MessageView::new(header, content);
        if node.connection.send(msg_id, &view) {
            stats.forwarded_messages += 1;
            stats.sent_messages += 1;
        }
    }
    if !from_parent {
        if let Some(parent) = parent.as_mut() {
            let view = MessageView::new(header, content);
            if parent.connection.send(msg_id, &view) {
                stats.forwarded_messages += 1;
                stats.sent_messages += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgbus_transport::{Connection, InProcessConnection};
    use msgbus_wire::MessagePriority;

    fn pair() -> (InProcessConnection, InProcessConnection) {
        InProcessConnection::pair(4096)
    }

    fn node_with(conn: InProcessConnection, maybe_router: bool) -> RoutedNode {
        RoutedNode::new(Box::new(conn), maybe_router)
    }

    fn header(source: EndpointId, target: EndpointId) -> MessageHeader {
        let mut h = MessageHeader::new(MessageId::new("app", "ping").unwrap(), source, target);
        h.priority = MessagePriority::Normal;
        h
    }

    #[test]
    fn broadcast_skips_incoming_and_respects_filters() {
        let mut nodes = HashMap::new();
        let (e1_local, e1_remote) = pair();
        let (e2_local, e2_remote) = pair();
        nodes.insert(EndpointId(11), node_with(e1_remote, false));
        nodes.insert(EndpointId(12), node_with(e2_remote, false));
        nodes
            .get(&EndpointId(12))
            .unwrap()
            .filters
            .write()
            .unwrap()
            .block(MessageId::new("app", "ping").unwrap());

        let mut parent = None;
        let recently = HashMap::new();
        let mut stats = RouterStats::default();
        let mut age = AgeTracker::default();
        let msg_id = MessageId::new("app", "ping").unwrap();
        let mut h = header(EndpointId(10), EndpointId::BROADCAST);

        route_message(
            &mut nodes,
            &mut parent,
            &recently,
            EndpointId(1),
            EndpointId(10),
            false,
            &msg_id,
            &mut h,
            b"x",
            0,
            &mut stats,
            &mut age,
        )
        .unwrap();

        let mut e1 = e1_local;
        let mut got_e1 = false;
        e1.fetch_messages(&mut |_id, _age, _view| {
            got_e1 = true;
            true
        });
        assert!(got_e1);

        let mut e2 = e2_local;
        let mut got_e2 = false;
        e2.fetch_messages(&mut |_id, _age, _view| {
            got_e2 = true;
            true
        });
        assert!(!got_e2);
    }

    #[test]
    fn hop_count_exceeded_is_dropped() {
        let mut nodes: HashMap<EndpointId, RoutedNode> = HashMap::new();
        let mut parent = None;
        let recently = HashMap::new();
        let mut stats = RouterStats::default();
        let mut age = AgeTracker::default();
        let msg_id = MessageId::new("app", "ping").unwrap();
        let mut h = header(EndpointId(10), EndpointId::BROADCAST);
        h.hop_count = 63;

        let err = route_message(
            &mut nodes,
            &mut parent,
            &recently,
            EndpointId(1),
            EndpointId(10),
            false,
            &msg_id,
            &mut h,
            b"x",
            0,
            &mut stats,
            &mut age,
        )
        .unwrap_err();
        assert_eq!(err, DropReason::HopCountExceeded);
        assert_eq!(h.hop_count, 64);
        assert_eq!(stats.dropped_messages, 1);
    }

    #[test]
    fn stale_normal_priority_message_is_dropped_but_critical_forwarded() {
        let mut nodes: HashMap<EndpointId, RoutedNode> = HashMap::new();
        let (_e1_local, e1_remote) = pair();
        nodes.insert(EndpointId(11), node_with(e1_remote, false));
        let mut parent = None;
        let recently = HashMap::new();
        let mut stats = RouterStats::default();
        let mut age = AgeTracker::default();
        let msg_id = MessageId::new("app", "ping").unwrap();

        let mut stale = header(EndpointId(10), EndpointId::BROADCAST);
        stale.priority = MessagePriority::Normal;
        stale.age_quarter_seconds = 121;
        let err = route_message(
            &mut nodes,
            &mut parent,
            &recently,
            EndpointId(1),
            EndpointId(10),
            false,
            &msg_id,
            &mut stale,
            b"x",
            0,
            &mut stats,
            &mut age,
        )
        .unwrap_err();
        assert_eq!(err, DropReason::Stale);

        let mut critical = header(EndpointId(10), EndpointId::BROADCAST);
        critical.priority = MessagePriority::Critical;
        critical.age_quarter_seconds = 121;
        route_message(
            &mut nodes,
            &mut parent,
            &recently,
            EndpointId(1),
            EndpointId(10),
            false,
            &msg_id,
            &mut critical,
            b"x",
            0,
            &mut stats,
            &mut age,
        )
        .unwrap();
    }

    #[test]
    fn targeted_message_to_recently_disconnected_is_dropped_silently() {
        let mut nodes: HashMap<EndpointId, RoutedNode> = HashMap::new();
        let mut parent = None;
        let mut recently = HashMap::new();
        recently.insert(EndpointId(99), std::time::Instant::now());
        let mut stats = RouterStats::default();
        let mut age = AgeTracker::default();
        let msg_id = MessageId::new("app", "ping").unwrap();
        let mut h = header(EndpointId(10), EndpointId(99));

        let err = route_message(
            &mut nodes,
            &mut parent,
            &recently,
            EndpointId(1),
            EndpointId(10),
            false,
            &msg_id,
            &mut h,
            b"x",
            0,
            &mut stats,
            &mut age,
        )
        .unwrap_err();
        assert_eq!(err, DropReason::RecentlyDisconnected);
    }

    #[test]
    fn unknown_target_is_tried_via_maybe_router_neighbors() {
        let mut nodes: HashMap<EndpointId, RoutedNode> = HashMap::new();
        let (r_local, r_remote) = pair();
        nodes.insert(EndpointId(20), node_with(r_remote, true));
        let mut parent = None;
        let recently = HashMap::new();
        let mut stats = RouterStats::default();
        let mut age = AgeTracker::default();
        let msg_id = MessageId::new("app", "ping").unwrap();
        let mut h = header(EndpointId(10), EndpointId(9999));

        route_message(
            &mut nodes,
            &mut parent,
            &recently,
            EndpointId(1),
            EndpointId(10),
            false,
            &msg_id,
            &mut h,
            b"x",
            0,
            &mut stats,
            &mut age,
        )
        .unwrap();

        let mut r = r_local;
        let mut got = false;
        r.fetch_messages(&mut |_id, _age, _view| {
            got = true;
            true
        });
        assert!(got);
    }
}
