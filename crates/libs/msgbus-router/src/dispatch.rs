//! The two routing-dispatch strategies `do_work` picks between: fetch every node's
//! available messages, then hand each one to [`Router::dispatch_message`].
//!
//! Below the configured node-count threshold this runs serially. Above
//! it, the fetch/update phase is split across a scoped thread per chunk
//! of nodes — each thread only touches the `RoutedNode`s in its own
//! disjoint slice, so no two threads ever call into the same
//! connection. Routing itself (which needs the full node map to do
//! broadcast fan-out and targeted lookup) stays serial after the workers
//! join; that join is the barrier between a pass's fetch and routing
//! phases.

use msgbus_transport::Connection;
use msgbus_wire::{EndpointId, StoredMessage};

use crate::node::RoutedNode;
use crate::router::Router;

impl Router {
    pub(crate) fn route_pass_serial(&mut self) -> bool {
        let dwell = self.dwell();
        let mut any = false;

        let ids: Vec<EndpointId> = self.nodes.keys().copied().collect();
        for id in ids {
            let Some(mut node) = self.nodes.remove(&id) else {
                continue;
            };
            let (updated, messages) = fetch_one(&mut node);
            any |= updated;
            self.nodes.insert(id, node);
            for msg in messages {
                self.dispatch_message(id, false, dwell, msg);
            }
        }

        any |= self.drain_parent(dwell);
        any
    }

    pub(crate) fn route_pass_parallel(&mut self) -> bool {
        let dwell = self.dwell();
        let mut entries: Vec<(EndpointId, RoutedNode)> = self.nodes.drain().collect();

        let worker_count = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
            .max(1)
            .min(entries.len().max(1));
        let chunk_size = entries.len().div_ceil(worker_count).max(1);

        let mut any = false;
        let mut collected: Vec<(EndpointId, StoredMessage)> = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = entries
                .chunks_mut(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        let mut local_any = false;
                        let mut local_msgs = Vec::new();
                        for (id, node) in chunk.iter_mut() {
                            let (updated, messages) = fetch_one(node);
                            local_any |= updated;
                            local_msgs.extend(messages.into_iter().map(|m| (*id, m)));
                        }
                        (local_any, local_msgs)
                    })
                })
                .collect();
            for handle in handles {
                let (local_any, local_msgs) = handle.join().expect("routing worker panicked");
                any |= local_any;
                collected.extend(local_msgs);
            }
        });

        self.nodes = entries.into_iter().collect();
        for (id, msg) in collected {
            self.dispatch_message(id, false, dwell, msg);
        }

        any |= self.drain_parent(dwell);
        any
    }

    fn drain_parent(&mut self, dwell: msgbus_wire::AgeQuarterSeconds) -> bool {
        let Some(mut parent) = self.parent.take() else {
            return false;
        };
        let updated = parent.connection.update();
        let mut messages = Vec::new();
        let got = parent.connection.fetch_messages(&mut |_msg_id, _age, view| {
            messages.push(view.to_stored());
            true
        });
        self.parent = Some(parent);
        for msg in messages {
            self.dispatch_message(EndpointId::BROADCAST, true, dwell, msg);
        }
        updated || got
    }

    fn dispatch_message(&mut self, incoming_id: EndpointId, from_parent: bool, dwell: msgbus_wire::AgeQuarterSeconds, msg: StoredMessage) {
        if msg.header.msg_id.is_special() {
            self.dispatch_control(incoming_id, from_parent, dwell, msg);
        } else {
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        }
    }
}

fn fetch_one(node: &mut RoutedNode) -> (bool, Vec<StoredMessage>) {
    let updated = node.connection.update();
    let mut messages = Vec::new();
    let got = node.connection.fetch_messages(&mut |_msg_id, _age, view| {
        messages.push(view.to_stored());
        true
    });
    (updated || got, messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use msgbus_transport::{Connection, InProcessConnection};
    use msgbus_wire::{MessageHeader, MessageId, MessageView};

    #[test]
    fn serial_pass_forwards_between_two_adopted_nodes() {
        let mut router = Router::new(RouterConfig::default());
        let (a_local, a_remote) = InProcessConnection::pair(4096);
        let (b_local, b_remote) = InProcessConnection::pair(4096);
        let a_id = EndpointId(router.config.base() + 1);
        let b_id = EndpointId(router.config.base() + 2);
        router.nodes.insert(a_id, RoutedNode::new(Box::new(a_remote), false));
        router.nodes.insert(b_id, RoutedNode::new(Box::new(b_remote), false));

        let mut a_local = a_local;
        let msg_id = MessageId::new("app", "ping").unwrap();
        let header = MessageHeader::new(msg_id, a_id, b_id);
        let view = MessageView::new(&header, b"hi");
        assert!(a_local.send(&msg_id, &view));

        router.route_pass_serial();

        let mut b_local = b_local;
        let mut got = false;
        b_local.fetch_messages(&mut |_id, _age, view| {
            got = view.content == b"hi";
            true
        });
        assert!(got);
    }
}
