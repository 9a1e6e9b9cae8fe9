//! Pending-connection state machine: accepted → id
//! assigned → password verified (if required) → promoted to a routed
//! node. Every step here only ever touches `self.pending[idx]` plus the
//! handful of router-wide bits (`next_id`, `self.config`) needed to drive
//! it forward; nothing here routes ordinary traffic.

use msgbus_transport::{Acceptor, Connection};
use msgbus_wire::{MessageHeader, MessageView, StoredMessage};

use crate::node::RoutedNode;
use crate::pending::PendingConnection;
use crate::router::Router;

impl Router {
    /// Pumps every acceptor and wraps whatever connections they handed
    /// back as fresh [`PendingConnection`]s.
    pub(crate) fn handle_accept(&mut self) -> bool {
        let mut any = false;
        let mut accepted: Vec<Box<dyn msgbus_transport::Connection>> = Vec::new();
        for acceptor in &mut self.acceptors {
            any |= acceptor.update();
            acceptor.process_accepted(&mut |conn| accepted.push(conn));
        }
        for conn in accepted {
            self.pending.push(PendingConnection::new(conn));
            any = true;
        }
        any
    }

    /// Drives the admission handshake for every pending connection one
    /// step, then promotes whichever ones are ready.
    pub(crate) fn handle_pending(&mut self) -> bool {
        let mut any = false;
        for idx in 0..self.pending.len() {
            any |= self.pump_pending(idx);
        }

        let mut idx = 0;
        while idx < self.pending.len() {
            if self.pending[idx].ready_to_adopt() {
                let pending = self.pending.remove(idx);
                self.adopt(pending);
                any = true;
            } else {
                idx += 1;
            }
        }
        any
    }

    fn pump_pending(&mut self, idx: usize) -> bool {
        let mut messages = Vec::new();
        let activity = {
            let pending = &mut self.pending[idx];
            let updated = pending.connection.update();
            let fetched = pending.connection.fetch_messages(&mut |_msg_id, _age, view| {
                messages.push(view.to_stored());
                true
            });
            updated || fetched
        };

        let mut any = activity;
        for msg in messages {
            self.handle_pending_message(idx, msg);
            any = true;
        }
        any |= self.maybe_challenge_password(idx);
        any
    }

    fn handle_pending_message(&mut self, idx: usize, msg: StoredMessage) {
        let request_id = self.ids.request_id;
        let announce_id = self.ids.announce_id;
        let ann_endpt_id = self.ids.ann_endpt_id;
        let enc_rutr_pwd = self.ids.enc_rutr_pwd;
        let assign_id = self.ids.assign_id;

        if msg.header.msg_id == request_id {
            if let Some(id) = self.next_id() {
                self.pending[idx].id = Some(id);
                let self_id = self.self_id();
                let mut header = MessageHeader::new(assign_id, self_id, id);
                header.priority = msgbus_wire::MessagePriority::High;
                let view = MessageView::new(&header, &[]);
                self.pending[idx].connection.send(&assign_id, &view);
            }
        } else if msg.header.msg_id == announce_id {
            self.pending[idx].id = Some(msg.header.target_id);
            self.pending[idx].is_endpoint = false;
        } else if msg.header.msg_id == ann_endpt_id {
            self.pending[idx].id = Some(msg.header.target_id);
            self.pending[idx].is_endpoint = true;
        } else if msg.header.msg_id == enc_rutr_pwd {
            if let Some(nonce) = self.pending[idx].nonce.clone() {
                let ok = crate::auth::matches_encrypted_shared_password(&nonce, &self.config.password, &msg.content);
                self.pending[idx].password_verified = ok;
            }
        }
    }

    /// Issues (or skips) the shared-password challenge once a pending
    /// connection has an id. Also covers the `password_not_required`
    /// transition: a connection that will never be challenged is marked
    /// verified as soon as it has an id.
    fn maybe_challenge_password(&mut self, idx: usize) -> bool {
        let pending = &self.pending[idx];
        if pending.id.is_none() || pending.password_verified || pending.is_in_process() {
            return false;
        }
        if !self.config.requires_password {
            self.pending[idx].password_verified = true;
            return true;
        }
        if pending.password_requested {
            return false;
        }

        let target = pending.id.expect("checked above");
        let nonce = crate::auth::random_nonce();
        let req_rutr_pwd = self.ids.req_rutr_pwd;
        let self_id = self.self_id();
        let mut header = MessageHeader::new(req_rutr_pwd, self_id, target);
        header.priority = msgbus_wire::MessagePriority::High;
        {
            let view = MessageView::new(&header, &nonce);
            self.pending[idx].connection.send(&req_rutr_pwd, &view);
        }
        self.pending[idx].nonce = Some(nonce);
        self.pending[idx].password_requested = true;
        true
    }

    fn adopt(&mut self, mut pending: PendingConnection) {
        let id = pending.id.expect("ready_to_adopt checked id is Some");
        let confirm_id = self.ids.confirm_id;
        let self_id = self.self_id();
        let mut header = MessageHeader::new(confirm_id, self_id, id);
        header.priority = msgbus_wire::MessagePriority::High;
        let view = MessageView::new(&header, &[]);
        pending.connection.send(&confirm_id, &view);

        let node = RoutedNode::new(pending.connection, !pending.is_endpoint);
        self.nodes.insert(id, node);
        self.endpoint_infos.entry(id).or_default();
        self.recently_disconnected.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use msgbus_transport::{Connection, InProcessConnection};
    use msgbus_wire::{EndpointId, MessageId};

    #[test]
    fn request_id_is_answered_and_connection_adopted_without_password() {
        let mut router = Router::new(RouterConfig::default());
        let (mut peer, ours) = InProcessConnection::pair(4096);
        router.pending.push(PendingConnection::new(Box::new(ours)));

        let self_id = router.self_id();
        let request_id = MessageId::control("requestId");
        let header = MessageHeader::new(request_id, EndpointId::BROADCAST, self_id);
        let view = MessageView::new(&header, &[]);
        peer.send(&request_id, &view);

        assert!(router.handle_pending());
        // id assigned, no password required: should already be promoted.
        assert_eq!(router.node_count(), 1);

        let mut saw_assign = false;
        let mut saw_confirm = false;
        peer.fetch_messages(&mut |id, _age, _view| {
            saw_assign |= id.method.as_str() == "assignId";
            saw_confirm |= id.method.as_str() == "confirmId";
            true
        });
        assert!(saw_assign);
        assert!(saw_confirm);
    }

    /// A connection that behaves exactly like [`InProcessConnection`] but
    /// reports a remote [`msgbus_wire::ConnectionKind`], so the
    /// password-challenge path (which `InProcessConnection` always
    /// bypasses) can be exercised in a test.
    struct RemoteStandIn(InProcessConnection);

    impl Connection for RemoteStandIn {
        fn send(&mut self, msg_id: &MessageId, msg: &MessageView<'_>) -> bool {
            self.0.send(msg_id, msg)
        }
        fn fetch_messages(
            &mut self,
            handler: &mut dyn FnMut(&MessageId, msgbus_wire::AgeQuarterSeconds, &MessageView<'_>) -> bool,
        ) -> bool {
            self.0.fetch_messages(handler)
        }
        fn update(&mut self) -> bool {
            self.0.update()
        }
        fn max_data_size(&self) -> usize {
            self.0.max_data_size()
        }
        fn is_usable(&self) -> bool {
            self.0.is_usable()
        }
        fn kind(&self) -> msgbus_wire::ConnectionKind {
            msgbus_wire::ConnectionKind::LocalInterprocess
        }
        fn type_id(&self) -> msgbus_transport::ConnectionTypeId {
            self.0.type_id()
        }
        fn query_statistics(&self, out: &mut msgbus_transport::ConnectionStatistics) {
            self.0.query_statistics(out)
        }
        fn cleanup(&mut self) {
            self.0.cleanup()
        }
    }

    #[test]
    fn password_required_blocks_promotion_until_verified() {
        let mut router = Router::new(RouterConfig {
            requires_password: true,
            password: "abc".into(),
            ..RouterConfig::default()
        });
        let (mut peer, ours) = InProcessConnection::pair(4096);
        let pc = PendingConnection::new(Box::new(RemoteStandIn(ours)));
        router.pending.push(pc);

        let self_id = router.self_id();
        let request_id = MessageId::control("requestId");
        let header = MessageHeader::new(request_id, EndpointId::BROADCAST, self_id);
        let view = MessageView::new(&header, &[]);
        peer.send(&request_id, &view);

        router.handle_pending();
        assert_eq!(router.node_count(), 0);
        assert!(router.pending[0].password_requested);

        let nonce = router.pending[0].nonce.clone().unwrap();
        let ciphertext = crate::auth::encrypt_nonce(&nonce, "abc");
        let enc_rutr_pwd = MessageId::control("encRutrPwd");
        let header = MessageHeader::new(enc_rutr_pwd, self_id, self_id);
        let view = MessageView::new(&header, &ciphertext);
        peer.send(&enc_rutr_pwd, &view);

        router.handle_pending();
        assert_eq!(router.node_count(), 1);
    }
}
