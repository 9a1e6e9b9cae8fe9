//! The `"eagiMsgBus"` control-plane dispatch table. Every
//! special message passes through [`Router::dispatch_control`] instead of
//! [`crate::forward::route_message`] directly; most handlers still end up
//! calling into forwarding once they've updated local state, since the
//! same control message is usually meaningful to every router on the
//! path, not just this one.

use msgbus_transport::Connection;
use msgbus_wire::{
    decode_message_id, encode_message_id, ConnectionKind, EndpointId, MessageHeader, MessageId,
    MessagePriority, MessageView, ProcessInstanceId, StoredMessage,
};

use crate::forward::route_message;
use crate::registry::RouterDescriptor;
use crate::router::Router;

fn encode_topo(router_id: EndpointId, instance_id: ProcessInstanceId, remote_id: EndpointId, kind: ConnectionKind) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 4 + 8 + 1);
    out.extend_from_slice(&router_id.0.to_be_bytes());
    out.extend_from_slice(&instance_id.0.to_be_bytes());
    out.extend_from_slice(&remote_id.0.to_be_bytes());
    out.push(match kind {
        ConnectionKind::InProcess => 0,
        ConnectionKind::LocalInterprocess => 1,
        ConnectionKind::Remote => 2,
    });
    out
}

fn decode_topo(payload: &[u8]) -> Option<(EndpointId, ProcessInstanceId, EndpointId, ConnectionKind)> {
    if payload.len() != 21 {
        return None;
    }
    let router_id = EndpointId(u64::from_be_bytes(payload[0..8].try_into().ok()?));
    let instance_id = ProcessInstanceId(u32::from_be_bytes(payload[8..12].try_into().ok()?));
    let remote_id = EndpointId(u64::from_be_bytes(payload[12..20].try_into().ok()?));
    let kind = match payload[20] {
        0 => ConnectionKind::InProcess,
        1 => ConnectionKind::LocalInterprocess,
        _ => ConnectionKind::Remote,
    };
    Some((router_id, instance_id, remote_id, kind))
}

fn encode_stats_rutr(forwarded: u64, dropped: u64, sent: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&forwarded.to_be_bytes());
    out.extend_from_slice(&dropped.to_be_bytes());
    out.extend_from_slice(&sent.to_be_bytes());
    out
}

fn encode_stats_conn(sent: u64, received: u64, bytes_sent: u64, bytes_received: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(32);
    out.extend_from_slice(&sent.to_be_bytes());
    out.extend_from_slice(&received.to_be_bytes());
    out.extend_from_slice(&bytes_sent.to_be_bytes());
    out.extend_from_slice(&bytes_received.to_be_bytes());
    out
}

impl Router {
    /// Dispatches one already-decoded control message. `incoming_id` is
    /// `EndpointId::BROADCAST` when it arrived over the parent link
    /// (`from_parent` tells the caller which).
    pub(crate) fn dispatch_control(
        &mut self,
        incoming_id: EndpointId,
        from_parent: bool,
        dwell: msgbus_wire::AgeQuarterSeconds,
        msg: StoredMessage,
    ) {
        let msg_id = msg.header.msg_id;

        if msg_id == self.ids.ping {
            if msg.header.target_id == self.self_id() {
                let mut header = MessageHeader::new(self.ids.pong, self.self_id(), msg.header.source_id);
                header.sequence_no = msg.header.sequence_no;
                header.priority = MessagePriority::High;
                let pong = self.ids.pong;
                if let Some(node) = self.nodes.get_mut(&incoming_id) {
                    let view = MessageView::new(&header, &[]);
                    node.connection.send(&pong, &view);
                }
                return;
            }
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.subscribe_to {
            if let Ok(subject) = decode_message_id(&msg.content) {
                let info = self.endpoint_infos.entry(msg.header.source_id).or_default();
                info.observe_instance(ProcessInstanceId(msg.header.sequence_no));
                info.subscribe(subject);
            }
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.unsub_from || msg_id == self.ids.not_sub_to {
            if let Ok(subject) = decode_message_id(&msg.content) {
                let info = self.endpoint_infos.entry(msg.header.source_id).or_default();
                info.observe_instance(ProcessInstanceId(msg.header.sequence_no));
                info.unsubscribe(subject);
            }
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.qry_subscrb {
            if let Ok(subject) = decode_message_id(&msg.content) {
                let subscribed = self
                    .endpoint_infos
                    .get(&msg.header.target_id)
                    .map(|info| info.is_subscribed(&subject));
                if let Some(subscribed) = subscribed {
                    let answer = if subscribed { self.ids.subscribe_to } else { self.ids.not_sub_to };
                    let payload = encode_message_id(&subject);
                    self.reply_direct(msg.header.source_id, answer, msg.header.target_id, &payload);
                }
            }
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.qry_subscrp {
            let subjects: Vec<MessageId> = self
                .endpoint_infos
                .get(&msg.header.target_id)
                .map(|info| info.subscribed.iter().copied().collect())
                .unwrap_or_default();
            let subscribe_to = self.ids.subscribe_to;
            for subject in subjects {
                let payload = encode_message_id(&subject);
                self.reply_direct(msg.header.source_id, subscribe_to, msg.header.target_id, &payload);
            }
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.blob_fragment || msg_id == self.ids.blob_resend || msg_id == self.ids.blob_prepare {
            self.dispatch_blob_control(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.rtr_cert_qry {
            if let Some(pem) = self.own_certificate.clone() {
                let io = Box::new(msgbus_blob::BufferSourceBlobIo::new(pem));
                let blob_id = self.blob.next_target_blob_id();
                let rtr_cert_qry = self.ids.rtr_cert_qry;
                let self_id = self.self_id();
                self.blob.push_outgoing(
                    rtr_cert_qry,
                    self_id,
                    msg.header.source_id,
                    blob_id,
                    io,
                    std::time::Duration::from_secs(30),
                    MessagePriority::Normal,
                );
            }
        } else if msg_id == self.ids.ept_cert_qry {
            let cert = self.endpoint_certs.get(&msg.header.target_id).cloned();
            if let Some(pem) = cert {
                let io = Box::new(msgbus_blob::BufferSourceBlobIo::new(pem));
                let blob_id = self.blob.next_target_blob_id();
                let ept_cert_qry = self.ids.ept_cert_qry;
                self.blob.push_outgoing(
                    ept_cert_qry,
                    msg.header.target_id,
                    msg.header.source_id,
                    blob_id,
                    io,
                    std::time::Duration::from_secs(30),
                    MessagePriority::Normal,
                );
            } else {
                self.forward_ordinary(incoming_id, from_parent, dwell, msg);
            }
        } else if msg_id == self.ids.topo_query {
            let querier = msg.header.source_id;
            let self_id = self.self_id();
            let instance = self.instance_id;
            let topo_rutr_cn = self.ids.topo_rutr_cn;
            let neighbors: Vec<(EndpointId, ConnectionKind)> =
                self.nodes.iter().map(|(&id, n)| (id, n.connection.kind())).collect();
            for (remote_id, kind) in neighbors {
                let payload = encode_topo(self_id, instance, remote_id, kind);
                self.reply_direct(querier, topo_rutr_cn, querier, &payload);
            }
            let parent_id = self.parent.as_ref().and_then(|p| p.confirmed_id);
            if let Some(parent_id) = parent_id {
                let payload = encode_topo(self_id, instance, parent_id, ConnectionKind::Remote);
                self.reply_direct(querier, topo_rutr_cn, querier, &payload);
            }
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.stats_query {
            let querier = msg.header.source_id;
            let stats = self.stats;
            let stats_rutr = self.ids.stats_rutr;
            let stats_conn = self.ids.stats_conn;
            let payload = encode_stats_rutr(stats.forwarded_messages, stats.dropped_messages, stats.sent_messages);
            self.reply_direct(querier, stats_rutr, querier, &payload);
            let neighbor_ids: Vec<EndpointId> = self.nodes.keys().copied().collect();
            for id in neighbor_ids {
                let mut conn_stats = msgbus_transport::ConnectionStatistics::default();
                if let Some(node) = self.nodes.get(&id) {
                    node.connection.query_statistics(&mut conn_stats);
                }
                let payload = encode_stats_conn(
                    conn_stats.messages_sent,
                    conn_stats.messages_received,
                    conn_stats.bytes_sent,
                    conn_stats.bytes_received,
                );
                self.reply_direct(querier, stats_conn, querier, &payload);
            }
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.req_rutr_pwd {
            if from_parent {
                let ciphertext = crate::auth::encrypt_nonce(&msg.content, &self.config.password);
                let enc_rutr_pwd = self.ids.enc_rutr_pwd;
                let self_id = self.self_id();
                if let Some(parent) = self.parent.as_mut() {
                    let mut header = MessageHeader::new(enc_rutr_pwd, self_id, EndpointId::BROADCAST);
                    header.priority = MessagePriority::High;
                    let view = MessageView::new(&header, &ciphertext);
                    parent.connection.send(&enc_rutr_pwd, &view);
                }
            }
        } else if msg_id == self.ids.topo_rutr_cn {
            if msg.header.target_id == self.self_id() {
                if let Some((_responder_id, instance_id, remote_id, connect_kind)) = decode_topo(&msg.content) {
                    self.registry.observe(RouterDescriptor {
                        router_id: remote_id,
                        instance_id,
                        connect_kind,
                    });
                }
            } else {
                self.forward_ordinary(incoming_id, from_parent, dwell, msg);
            }
        } else if msg_id == self.ids.still_alive {
            self.endpoint_infos
                .entry(msg.header.source_id)
                .or_default()
                .observe_instance(ProcessInstanceId(msg.header.sequence_no));
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.bye_bye_endp || msg_id == self.ids.bye_bye_rutr || msg_id == self.ids.bye_bye_brdg {
            if let Some(node) = self.nodes.get_mut(&incoming_id) {
                node.do_disconnect = true;
            }
            self.endpoint_infos.remove(&msg.header.source_id);
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        } else if msg_id == self.ids.not_a_router {
            if let Some(node) = self.nodes.get_mut(&incoming_id) {
                node.maybe_router = false;
            }
        } else if msg_id == self.ids.msg_blk_list || msg_id == self.ids.msg_alw_list {
            let block = msg_id == self.ids.msg_blk_list;
            if let Ok(subject) = decode_message_id(&msg.content) {
                if !subject.is_special() {
                    if let Some(node) = self.nodes.get_mut(&incoming_id) {
                        if let Ok(mut filters) = node.filters.write() {
                            if block {
                                filters.block(subject);
                            } else {
                                filters.allow(subject);
                            }
                        }
                    }
                }
            }
        } else if msg_id == self.ids.clr_blk_list || msg_id == self.ids.clr_alw_list {
            let clear_block = msg_id == self.ids.clr_blk_list;
            if let Some(node) = self.nodes.get_mut(&incoming_id) {
                if let Ok(mut filters) = node.filters.write() {
                    if clear_block {
                        filters.clear_block_list();
                    } else {
                        filters.clear_allow_list();
                    }
                }
            }
        } else if msg_id == self.ids.assign_id
            || msg_id == self.ids.confirm_id
            || msg_id == self.ids.announce_id
            || msg_id == self.ids.ann_endpt_id
            || msg_id == self.ids.request_id
            || msg_id == self.ids.msg_flow_inf
        {
            // Admission handshake / router-emitted advisory: consumed,
            // never forwarded.
            log::trace!("ignoring post-admission {msg_id} from already-adopted node");
        } else {
            log::debug!("unknown special message {msg_id}, forwarding as ordinary");
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
        }
    }

    fn dispatch_blob_control(
        &mut self,
        incoming_id: EndpointId,
        from_parent: bool,
        dwell: msgbus_wire::AgeQuarterSeconds,
        msg: StoredMessage,
    ) {
        if msg.header.target_id != self.self_id() {
            self.forward_ordinary(incoming_id, from_parent, dwell, msg);
            return;
        }
        let msg_id = msg.header.msg_id;
        let source_id = msg.header.source_id;
        let age = msg.header.age_quarter_seconds;
        if msg_id == self.ids.blob_fragment {
            let mut get_io = |_: &MessageId, _: i64, _: EndpointId| -> Option<Box<dyn msgbus_blob::TargetBlobIo>> { None };
            let _ = self.blob.process_incoming_fragment(&msg_id, source_id, age, &msg.content, &mut get_io);
        } else if msg_id == self.ids.blob_resend {
            let _ = self.blob.process_resend(&msg.content);
        } else if msg_id == self.ids.blob_prepare {
            let _ = self.blob.process_incoming_prepare(&msg.content);
        }
    }

    /// Used by most control handlers once they've updated local state:
    /// the underlying message is still forwarded like an ordinary one.
    pub(crate) fn forward_ordinary(
        &mut self,
        incoming_id: EndpointId,
        from_parent: bool,
        dwell: msgbus_wire::AgeQuarterSeconds,
        mut msg: StoredMessage,
    ) {
        let msg_id = msg.header.msg_id;
        let content = std::mem::take(&mut msg.content);
        let self_id = self.self_id();
        let _ = route_message(
            &mut self.nodes,
            &mut self.parent,
            &self.recently_disconnected,
            self_id,
            incoming_id,
            from_parent,
            &msg_id,
            &mut msg.header,
            &content,
            dwell,
            &mut self.stats,
            &mut self.age_tracker,
        );
    }
}
