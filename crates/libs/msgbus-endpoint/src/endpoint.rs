use std::collections::HashMap;
use std::time::Instant;

use msgbus_blob::{BlobManipulator, BlobManipulatorConfig, SourceBlobIo, TargetBlobIo};
use msgbus_storage::PriorityQueue;
use msgbus_transport::Connection;
use msgbus_wire::{
    encode_message_id, EndpointId, MessageHeader, MessageId, MessagePriority, MessageView,
    ProcessInstanceId, StoredMessage,
};

use crate::config::EndpointConfig;
use crate::error::EndpointError;
use crate::ids::EndpointControlIds;
use crate::incoming::IncomingState;
use crate::stats::{EndpointStatistics, MessageFlowInfo};

/// The client-side bus node: attaches one connection to a router, runs
/// the `requestId`/`assignId`/`confirmId` admission handshake, tracks its
/// own subscriptions, and exchanges ordinary messages and BLOBs.
///
/// Mirrors the role `Router` plays on the other end of the same
/// connection — cooperative, non-blocking, driven entirely by repeated
/// `do_work()` calls from the owner's loop.
pub struct Endpoint {
    config: EndpointConfig,
    ids: EndpointControlIds,
    instance_id: ProcessInstanceId,
    connection: Option<Box<dyn Connection>>,
    self_id: Option<EndpointId>,
    confirmed: bool,
    requested_at: Instant,
    last_alive: Instant,
    password: Option<String>,
    subscriptions: HashMap<MessageId, IncomingState>,
    blob: BlobManipulator,
    stats: EndpointStatistics,
    flow_info: MessageFlowInfo,
}

impl Endpoint {
    pub fn new(config: EndpointConfig) -> Self {
        let ids = EndpointControlIds::default();
        let blob = BlobManipulator::new(
            ids.blob_fragment,
            ids.blob_resend,
            ids.blob_prepare,
            BlobManipulatorConfig {
                size_cap_bytes: config.blob_size_cap_bytes,
            },
        );
        Endpoint {
            config,
            ids,
            instance_id: ProcessInstanceId(std::process::id()),
            connection: None,
            self_id: None,
            confirmed: false,
            requested_at: Instant::now(),
            last_alive: Instant::now(),
            password: None,
            subscriptions: HashMap::new(),
            blob,
            stats: EndpointStatistics::default(),
            flow_info: MessageFlowInfo::default(),
        }
    }

    /// Shared secret used to answer a router's `reqRutrPwd` challenge, if
    /// one ever arrives. Left unset, a challenge simply goes unanswered.
    pub fn set_password(&mut self, password: String) {
        self.password = Some(password);
    }

    pub fn self_id(&self) -> Option<EndpointId> {
        self.self_id
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn stats(&self) -> EndpointStatistics {
        self.stats
    }

    /// Attaches a fresh connection to a router and immediately asks it to
    /// assign an id. Only one connection may be
    /// attached at a time.
    pub fn attach_connection(&mut self, connection: Box<dyn Connection>) -> Result<(), EndpointError> {
        if self.connection.is_some() {
            return Err(EndpointError::ConnectionAlreadyAttached);
        }
        self.connection = Some(connection);
        self.self_id = None;
        self.confirmed = false;
        self.requested_at = Instant::now();
        self.last_alive = Instant::now();
        let request_id = self.ids.request_id;
        let header = MessageHeader::new(request_id, EndpointId::BROADCAST, EndpointId::BROADCAST);
        let view = MessageView::new(&header, &[]);
        if let Some(conn) = self.connection.as_mut() {
            conn.send(&request_id, &view);
        }
        Ok(())
    }

    /// Announces a self-chosen id instead of asking the router to assign
    /// one. Must be called right
    /// after `attach_connection`.
    pub fn announce_self(&mut self, id: EndpointId) {
        self.self_id = Some(id);
        let ann_endpt_id = self.ids.ann_endpt_id;
        let header = MessageHeader::new(ann_endpt_id, id, id);
        let view = MessageView::new(&header, &[]);
        if let Some(conn) = self.connection.as_mut() {
            conn.send(&ann_endpt_id, &view);
        }
    }

    /// Registers interest in `msg_id`. Subscriptions are reference
    /// counted: the `subscribTo` notice is sent only on the first call and
    /// suppressed on nested ones.
    pub fn subscribe(&mut self, msg_id: MessageId) {
        let state = self.subscriptions.entry(msg_id).or_default();
        state.subscription_count += 1;
        if state.subscription_count == 1 {
            self.notify_subscription(msg_id, self.ids.subscribe_to);
        }
    }

    pub fn unsubscribe(&mut self, msg_id: MessageId) {
        let Some(state) = self.subscriptions.get_mut(&msg_id) else {
            return;
        };
        state.subscription_count = state.subscription_count.saturating_sub(1);
        if state.subscription_count == 0 {
            self.notify_subscription(msg_id, self.ids.unsub_from);
        }
    }

    fn notify_subscription(&mut self, subject: MessageId, notice: MessageId) {
        let Some(self_id) = self.self_id else { return };
        let Some(conn) = self.connection.as_mut() else { return };
        let mut header = MessageHeader::new(notice, self_id, EndpointId::BROADCAST);
        header.sequence_no = self.instance_id.0;
        let payload = encode_message_id(&subject);
        let view = MessageView::new(&header, &payload);
        conn.send(&notice, &view);
    }

    /// Sends an ordinary application message. Fails (returns `false`)
    /// until an id has been assigned.
    pub fn send(&mut self, msg_id: MessageId, target: EndpointId, content: &[u8], priority: MessagePriority) -> bool {
        let Some(self_id) = self.self_id else { return false };
        let Some(conn) = self.connection.as_mut() else { return false };
        let mut header = MessageHeader::new(msg_id, self_id, target);
        header.priority = priority;
        let view = MessageView::new(&header, content);
        conn.send(&msg_id, &view)
    }

    /// Pops the next queued message for a subscribed id, highest priority
    /// first, oldest first among ties.
    pub fn try_receive(&mut self, msg_id: &MessageId) -> Option<StoredMessage> {
        self.subscriptions.get_mut(msg_id)?.queue.pop()
    }

    pub fn push_blob(
        &mut self,
        msg_id: MessageId,
        target: EndpointId,
        target_blob_id: msgbus_blob::TargetBlobId,
        io: Box<dyn SourceBlobIo>,
        max_time: std::time::Duration,
        priority: MessagePriority,
    ) -> Option<msgbus_blob::SourceBlobId> {
        let self_id = self.self_id?;
        self.blob.push_outgoing(msg_id, self_id, target, target_blob_id, io, max_time, priority)
    }

    pub fn expect_blob(
        &mut self,
        msg_id: MessageId,
        source_id: EndpointId,
        target_blob_id: msgbus_blob::TargetBlobId,
        total_size: i64,
        io: Box<dyn TargetBlobIo>,
        max_time: std::time::Duration,
    ) -> bool {
        self.blob.expect_incoming(msg_id, source_id, target_blob_id, total_size, io, max_time)
    }

    /// One cooperative tick: pump the connection, progress the admission
    /// handshake, dispatch whatever arrived, and emit `stillAlive` if due.
    /// Returns whether anything happened.
    pub fn do_work(&mut self) -> bool {
        let mut any = false;
        any |= self.pump_connection();
        any |= self.maybe_send_still_alive();
        any |= self.process_own_blobs();
        any
    }

    fn pump_connection(&mut self) -> bool {
        let Some(mut conn) = self.connection.take() else {
            return false;
        };
        let updated = conn.update();
        let mut messages = Vec::new();
        let fetched = conn.fetch_messages(&mut |_id, _age, view| {
            messages.push(view.to_stored());
            true
        });
        self.connection = Some(conn);

        for msg in messages {
            self.handle_incoming(msg);
        }
        updated || fetched
    }

    fn handle_incoming(&mut self, msg: StoredMessage) {
        self.stats.messages_received += 1;
        let msg_id = msg.header.msg_id;

        if msg_id == self.ids.assign_id {
            self.self_id = Some(msg.header.target_id);
        } else if msg_id == self.ids.confirm_id {
            self.confirmed = true;
        } else if msg_id == self.ids.req_rutr_pwd {
            self.answer_password_challenge(&msg.content);
        } else if msg_id == self.ids.ping {
            self.answer_ping(msg.header.sequence_no, msg.header.source_id);
        } else if msg_id == self.ids.msg_flow_inf {
            if msg.content.len() == 4 {
                self.flow_info.avg_msg_age_ms = u32::from_be_bytes(msg.content[0..4].try_into().unwrap());
            }
        } else if msg_id == self.ids.blob_fragment || msg_id == self.ids.blob_resend || msg_id == self.ids.blob_prepare {
            self.handle_blob_control(msg_id, msg);
        } else if msg_id == self.ids.subscribe_to || msg_id == self.ids.not_sub_to || msg_id == self.ids.pong {
            // Informational replies to a query this endpoint issued;
            // nothing to update beyond delivering it like any other
            // message a caller might be waiting on.
            self.deliver_if_subscribed(msg);
        } else {
            self.deliver_if_subscribed(msg);
        }
    }

    fn deliver_if_subscribed(&mut self, msg: StoredMessage) {
        let msg_id = msg.header.msg_id;
        if let Some(state) = self.subscriptions.get_mut(&msg_id) {
            state.queue.push(msg);
        } else {
            log::trace!("dropping {msg_id}: not subscribed");
        }
    }

    fn answer_password_challenge(&mut self, nonce: &[u8]) {
        let Some(password) = self.password.as_deref() else {
            log::warn!("router requested a password but none is configured");
            return;
        };
        let Some(self_id) = self.self_id else { return };
        let ciphertext = crate::auth::encrypt_nonce(nonce, password);
        let enc_rutr_pwd = self.ids.enc_rutr_pwd;
        if let Some(conn) = self.connection.as_mut() {
            let header = MessageHeader::new(enc_rutr_pwd, self_id, EndpointId::BROADCAST);
            let view = MessageView::new(&header, &ciphertext);
            conn.send(&enc_rutr_pwd, &view);
        }
    }

    fn answer_ping(&mut self, sequence_no: msgbus_wire::SequenceNo, from: EndpointId) {
        let Some(self_id) = self.self_id else { return };
        let pong = self.ids.pong;
        let mut header = MessageHeader::new(pong, self_id, from);
        header.sequence_no = sequence_no;
        header.priority = MessagePriority::High;
        if let Some(conn) = self.connection.as_mut() {
            let view = MessageView::new(&header, &[]);
            conn.send(&pong, &view);
        }
    }

    fn handle_blob_control(&mut self, msg_id: MessageId, msg: StoredMessage) {
        let source_id = msg.header.source_id;
        let age = msg.header.age_quarter_seconds;
        if msg_id == self.ids.blob_fragment {
            let mut get_io = |_: &MessageId, _: i64, _: EndpointId| -> Option<Box<dyn TargetBlobIo>> { None };
            let _ = self.blob.process_incoming_fragment(&msg_id, source_id, age, &msg.content, &mut get_io);
        } else if msg_id == self.ids.blob_resend {
            let _ = self.blob.process_resend(&msg.content);
        } else if msg_id == self.ids.blob_prepare {
            let _ = self.blob.process_incoming_prepare(&msg.content);
        }
    }

    fn process_own_blobs(&mut self) -> bool {
        let Some(conn) = self.connection.as_mut() else {
            return false;
        };
        let max_size = conn.max_data_size();
        let mut send = |msg_id: &MessageId, view: &MessageView<'_>| -> bool { conn.send(msg_id, view) };
        let sent = self.blob.process_outgoing(&mut send, max_size, 4);
        let maintained = self.blob.do_maintenance(&mut send, max_size);
        sent || maintained
    }

    fn maybe_send_still_alive(&mut self) -> bool {
        let Some(self_id) = self.self_id else { return false };
        if self.last_alive.elapsed() < self.config.alive_notify_period {
            return false;
        }
        let still_alive = self.ids.still_alive;
        let mut header = MessageHeader::new(still_alive, self_id, EndpointId::BROADCAST);
        header.sequence_no = self.instance_id.0;
        if let Some(conn) = self.connection.as_mut() {
            let view = MessageView::new(&header, &[]);
            conn.send(&still_alive, &view);
        }
        self.last_alive = Instant::now();
        true
    }

    /// Whether the handshake is past `no_id_timeout` without an id — the
    /// owner should attach a fresh connection and retry.
    pub fn handshake_timed_out(&self) -> bool {
        self.self_id.is_none() && self.requested_at.elapsed() > self.config.no_id_timeout
    }

    /// Graceful disconnect: announce `byeByeEndp` and drop the connection.
    pub fn disconnect(&mut self) {
        if let (Some(self_id), Some(conn)) = (self.self_id, self.connection.as_mut()) {
            let bye_bye_endp = self.ids.bye_bye_endp;
            let header = MessageHeader::new(bye_bye_endp, self_id, EndpointId::BROADCAST);
            let view = MessageView::new(&header, &[]);
            conn.send(&bye_bye_endp, &view);
        }
        if let Some(mut conn) = self.connection.take() {
            conn.cleanup();
        }
        self.self_id = None;
        self.confirmed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgbus_transport::InProcessConnection;

    #[test]
    fn attaching_a_connection_immediately_requests_an_id() {
        let mut endpoint = Endpoint::new(EndpointConfig::default());
        let (mut peer, ours) = InProcessConnection::pair(4096);
        endpoint.attach_connection(Box::new(ours)).unwrap();

        let mut saw_request = false;
        peer.fetch_messages(&mut |id, _age, _view| {
            saw_request |= id.method.as_str() == "requestId";
            true
        });
        assert!(saw_request);
    }

    #[test]
    fn assign_id_then_confirm_id_completes_the_handshake() {
        let mut endpoint = Endpoint::new(EndpointConfig::default());
        let (mut peer, ours) = InProcessConnection::pair(4096);
        endpoint.attach_connection(Box::new(ours)).unwrap();

        let assign_id = MessageId::control("assignId");
        let header = MessageHeader::new(assign_id, EndpointId::BROADCAST, EndpointId(42));
        let view = MessageView::new(&header, &[]);
        peer.send(&assign_id, &view);
        endpoint.do_work();
        assert_eq!(endpoint.self_id(), Some(EndpointId(42)));
        assert!(!endpoint.is_confirmed());

        let confirm_id = MessageId::control("confirmId");
        let header = MessageHeader::new(confirm_id, EndpointId::BROADCAST, EndpointId(42));
        let view = MessageView::new(&header, &[]);
        peer.send(&confirm_id, &view);
        endpoint.do_work();
        assert!(endpoint.is_confirmed());
    }

    #[test]
    fn password_challenge_is_answered_with_a_keyed_hmac() {
        let mut endpoint = Endpoint::new(EndpointConfig::default());
        endpoint.set_password("hunter2".into());
        let (mut peer, ours) = InProcessConnection::pair(4096);
        endpoint.attach_connection(Box::new(ours)).unwrap();

        let assign_id = MessageId::control("assignId");
        let header = MessageHeader::new(assign_id, EndpointId::BROADCAST, EndpointId(7));
        let view = MessageView::new(&header, &[]);
        peer.send(&assign_id, &view);
        endpoint.do_work();

        let nonce = vec![9u8; 16];
        let req_rutr_pwd = MessageId::control("reqRutrPwd");
        let header = MessageHeader::new(req_rutr_pwd, EndpointId::BROADCAST, EndpointId(7));
        let view = MessageView::new(&header, &nonce);
        peer.send(&req_rutr_pwd, &view);
        endpoint.do_work();

        let expected = crate::auth::encrypt_nonce(&nonce, "hunter2");
        let mut seen = None;
        peer.fetch_messages(&mut |id, _age, view| {
            if id.method.as_str() == "encRutrPwd" {
                seen = Some(view.content.to_vec());
            }
            true
        });
        assert_eq!(seen, Some(expected));
    }

    #[test]
    fn subscribing_sends_subscribe_to_once_per_distinct_interest() {
        let mut endpoint = Endpoint::new(EndpointConfig::default());
        let (mut peer, ours) = InProcessConnection::pair(4096);
        endpoint.attach_connection(Box::new(ours)).unwrap();
        let assign_id = MessageId::control("assignId");
        let header = MessageHeader::new(assign_id, EndpointId::BROADCAST, EndpointId(3));
        let view = MessageView::new(&header, &[]);
        peer.send(&assign_id, &view);
        endpoint.do_work();

        let subject = MessageId::new("app", "chat").unwrap();
        endpoint.subscribe(subject);
        endpoint.subscribe(subject);

        let mut count = 0;
        peer.fetch_messages(&mut |id, _age, _view| {
            if id.method.as_str() == "subscribTo" {
                count += 1;
            }
            true
        });
        assert_eq!(count, 1, "nested subscribe calls must not re-announce");
    }

    #[test]
    fn received_message_for_a_subscribed_id_is_queued_for_try_receive() {
        let mut endpoint = Endpoint::new(EndpointConfig::default());
        let (mut peer, ours) = InProcessConnection::pair(4096);
        endpoint.attach_connection(Box::new(ours)).unwrap();
        let assign_id = MessageId::control("assignId");
        let header = MessageHeader::new(assign_id, EndpointId::BROADCAST, EndpointId(9));
        let view = MessageView::new(&header, &[]);
        peer.send(&assign_id, &view);
        endpoint.do_work();

        let chat = MessageId::new("app", "chat").unwrap();
        endpoint.subscribe(chat);

        let header = MessageHeader::new(chat, EndpointId(1), EndpointId(9));
        let view = MessageView::new(&header, b"hi");
        peer.send(&chat, &view);
        endpoint.do_work();

        let received = endpoint.try_receive(&chat).expect("message delivered to subscribed queue");
        assert_eq!(received.content, b"hi");
    }
}
