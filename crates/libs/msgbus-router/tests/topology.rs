//! `topoQuery`/`topoRutrCn` exercised end to end: a querier adopted by
//! the router should hear one `topoRutrCn` back per other adopted node.

use msgbus_router::{Router, RouterConfig};
use msgbus_transport::{Connection, InProcessConnection};
use msgbus_wire::{EndpointId, MessageHeader, MessageId, MessageView};

fn pump(router: &mut Router, times: usize) {
    for _ in 0..times {
        router.do_work(4);
    }
}

struct OneShot(Option<Box<dyn Connection>>);

impl msgbus_transport::Acceptor for OneShot {
    fn update(&mut self) -> bool {
        self.0.is_some()
    }
    fn process_accepted(&mut self, handler: &mut dyn FnMut(Box<dyn Connection>)) {
        if let Some(conn) = self.0.take() {
            handler(conn);
        }
    }
}

fn adopt(router: &mut Router) -> (EndpointId, InProcessConnection) {
    let (mut peer, ours) = InProcessConnection::pair(4096);
    router.add_acceptor(Box::new(OneShot(Some(Box::new(ours)))));
    pump(router, 1);

    let request_id = MessageId::control("requestId");
    let header = MessageHeader::new(request_id, EndpointId::BROADCAST, EndpointId::BROADCAST);
    let view = MessageView::new(&header, &[]);
    peer.send(&request_id, &view);
    pump(router, 2);

    let mut assigned = None;
    peer.fetch_messages(&mut |id, _age, view| {
        if id.method.as_str() == "assignId" {
            assigned = Some(view.header.target_id);
        }
        true
    });
    (assigned.expect("router assigned an id"), peer)
}

/// `encode_topo`'s layout, inlined here since it's private to the router
/// crate: 8-byte responding-router id, 4-byte instance id, 8-byte remote
/// peer id, 1-byte connection-kind tag.
fn remote_id_from_topo_payload(payload: &[u8]) -> u64 {
    assert_eq!(payload.len(), 21);
    u64::from_be_bytes(payload[12..20].try_into().unwrap())
}

#[test]
fn topo_query_answers_with_one_topo_rutr_cn_per_neighbor() {
    let mut router = Router::new(RouterConfig::default());
    let (querier_id, mut querier) = adopt(&mut router);
    let (neighbor_id, _neighbor) = adopt(&mut router);

    let topo_query = MessageId::control("topoQuery");
    let header = MessageHeader::new(topo_query, querier_id, querier_id);
    let view = MessageView::new(&header, &[]);
    querier.send(&topo_query, &view);
    pump(&mut router, 1);

    let mut seen_remote_ids = Vec::new();
    querier.fetch_messages(&mut |id, _age, view| {
        if id.method.as_str() == "topoRutrCn" {
            seen_remote_ids.push(remote_id_from_topo_payload(view.content));
        }
        true
    });

    // topoQuery reports every connection this router currently has, which
    // includes the edge back to the querier itself.
    assert!(seen_remote_ids.contains(&neighbor_id.0));
    assert!(seen_remote_ids.contains(&querier_id.0));
    assert_eq!(seen_remote_ids.len(), 2);
}
