use msgbus_wire::MessageId;

/// The subset of `(class="eagiMsgBus", method)` ids an endpoint itself
/// emits or reacts to — a smaller set than a router's, since an endpoint
/// never answers `topoQuery`/`statsQuery` or runs the forwarding table.
pub struct EndpointControlIds {
    pub ping: MessageId,
    pub pong: MessageId,
    pub subscribe_to: MessageId,
    pub unsub_from: MessageId,
    pub not_sub_to: MessageId,
    pub blob_fragment: MessageId,
    pub blob_resend: MessageId,
    pub blob_prepare: MessageId,
    pub req_rutr_pwd: MessageId,
    pub enc_rutr_pwd: MessageId,
    pub still_alive: MessageId,
    pub bye_bye_endp: MessageId,
    pub assign_id: MessageId,
    pub confirm_id: MessageId,
    pub announce_id: MessageId,
    pub ann_endpt_id: MessageId,
    pub request_id: MessageId,
    pub msg_flow_inf: MessageId,
}

impl Default for EndpointControlIds {
    fn default() -> Self {
        EndpointControlIds {
            ping: MessageId::control("ping"),
            pong: MessageId::control("pong"),
            subscribe_to: MessageId::control("subscribTo"),
            unsub_from: MessageId::control("unsubFrom"),
            not_sub_to: MessageId::control("notSubTo"),
            blob_fragment: MessageId::control("blobFrgmnt"),
            blob_resend: MessageId::control("blobResend"),
            blob_prepare: MessageId::control("blobPrpare"),
            req_rutr_pwd: MessageId::control("reqRutrPwd"),
            enc_rutr_pwd: MessageId::control("encRutrPwd"),
            still_alive: MessageId::control("stillAlive"),
            bye_bye_endp: MessageId::control("byeByeEndp"),
            assign_id: MessageId::control("assignId"),
            confirm_id: MessageId::control("confirmId"),
            announce_id: MessageId::control("announceId"),
            ann_endpt_id: MessageId::control("annEndptId"),
            request_id: MessageId::control("requestId"),
            msg_flow_inf: MessageId::control("msgFlowInf"),
        }
    }
}
