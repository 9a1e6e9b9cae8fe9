//! Ordinary message forwarding and the drop paths around it, driven
//! entirely through adopted connections and `do_work()` — no direct
//! access to router internals.

use msgbus_router::{Router, RouterConfig};
use msgbus_transport::{Connection, InProcessConnection};
use msgbus_wire::{EndpointId, MessageHeader, MessageId, MessagePriority, MessageView};

fn pump(router: &mut Router, times: usize) {
    for _ in 0..times {
        router.do_work(4);
    }
}

/// Adopts an in-process pair by running the `requestId` handshake to
/// completion and returns the id the router assigned plus the caller's
/// end of the connection.
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

#[test]
fn targeted_message_is_forwarded_to_the_right_node() {
    let mut router = Router::new(RouterConfig::default());
    let (a_id, mut a) = adopt(&mut router);
    let (b_id, mut b) = adopt(&mut router);

    let chat = MessageId::new("app", "chat").unwrap();
    let header = MessageHeader::new(chat, a_id, b_id);
    let view = MessageView::new(&header, b"hello");
    a.send(&chat, &view);

    pump(&mut router, 1);

    let mut got = false;
    b.fetch_messages(&mut |_id, _age, view| {
        got = view.content == b"hello";
        true
    });
    assert!(got);
}

#[test]
fn block_listed_subject_is_not_forwarded_to_the_blocking_node() {
    let mut router = Router::new(RouterConfig::default());
    let (a_id, mut a) = adopt(&mut router);
    let (b_id, mut b) = adopt(&mut router);

    let chat = MessageId::new("app", "chat").unwrap();
    let msg_blk_list = MessageId::control("msgBlkList");
    let block_header = MessageHeader::new(msg_blk_list, b_id, EndpointId::BROADCAST);
    let block_view = MessageView::new(&block_header, &msgbus_wire::encode_message_id(&chat));
    b.send(&msg_blk_list, &block_view);
    pump(&mut router, 1);

    let header = MessageHeader::new(chat, a_id, EndpointId::BROADCAST);
    let view = MessageView::new(&header, b"hello");
    a.send(&chat, &view);
    pump(&mut router, 1);

    let mut got = false;
    b.fetch_messages(&mut |_id, _age, _view| {
        got = true;
        true
    });
    assert!(!got, "b blocked \"app.chat\" and should not have received the broadcast");
}

#[test]
fn message_past_the_hop_count_ceiling_is_dropped_and_counted() {
    let mut router = Router::new(RouterConfig::default());
    let (a_id, mut a) = adopt(&mut router);
    let (_b_id, mut b) = adopt(&mut router);

    let chat = MessageId::new("app", "chat").unwrap();
    let mut header = MessageHeader::new(chat, a_id, EndpointId::BROADCAST);
    header.hop_count = msgbus_wire::MAX_HOP_COUNT - 1;
    let view = MessageView::new(&header, b"hello");
    a.send(&chat, &view);

    let before = router.stats().dropped_messages;
    pump(&mut router, 1);
    assert!(router.stats().dropped_messages > before);

    let mut got = false;
    b.fetch_messages(&mut |_id, _age, _view| {
        got = true;
        true
    });
    assert!(!got);
}

#[test]
fn stale_normal_priority_broadcast_is_dropped_but_critical_still_arrives() {
    let mut router = Router::new(RouterConfig::default());
    let (a_id, mut a) = adopt(&mut router);
    let (_b_id, mut b) = adopt(&mut router);

    let chat = MessageId::new("app", "chat").unwrap();
    let mut stale = MessageHeader::new(chat, a_id, EndpointId::BROADCAST);
    stale.priority = MessagePriority::Normal;
    stale.age_quarter_seconds = 121;
    let view = MessageView::new(&stale, b"old");
    a.send(&chat, &view);
    pump(&mut router, 1);

    let mut got_stale = false;
    b.fetch_messages(&mut |_id, _age, _view| {
        got_stale = true;
        true
    });
    assert!(!got_stale);

    let mut urgent = MessageHeader::new(chat, a_id, EndpointId::BROADCAST);
    urgent.priority = MessagePriority::Critical;
    urgent.age_quarter_seconds = 121;
    let view = MessageView::new(&urgent, b"fresh enough to matter");
    a.send(&chat, &view);
    pump(&mut router, 1);

    let mut got_critical = false;
    b.fetch_messages(&mut |_id, _age, view| {
        got_critical = view.content == b"fresh enough to matter";
        true
    });
    assert!(got_critical);
}
