use msgbus_wire::MessageId;

/// Every control-plane `(class="eagiMsgBus", method)` id the router
/// dispatches on. Computed once at construction rather
/// than re-parsed from a literal on every message.
pub struct ControlIds {
    pub ping: MessageId,
    pub pong: MessageId,
    pub subscribe_to: MessageId,
    pub unsub_from: MessageId,
    pub not_sub_to: MessageId,
    pub qry_subscrb: MessageId,
    pub qry_subscrp: MessageId,
    pub blob_fragment: MessageId,
    pub blob_resend: MessageId,
    pub blob_prepare: MessageId,
    pub rtr_cert_qry: MessageId,
    pub ept_cert_qry: MessageId,
    pub topo_query: MessageId,
    pub topo_rutr_cn: MessageId,
    pub stats_query: MessageId,
    pub stats_rutr: MessageId,
    pub stats_conn: MessageId,
    pub req_rutr_pwd: MessageId,
    pub enc_rutr_pwd: MessageId,
    pub still_alive: MessageId,
    pub bye_bye_endp: MessageId,
    pub bye_bye_rutr: MessageId,
    pub bye_bye_brdg: MessageId,
    pub not_a_router: MessageId,
    pub msg_blk_list: MessageId,
    pub msg_alw_list: MessageId,
    pub clr_blk_list: MessageId,
    pub clr_alw_list: MessageId,
    pub assign_id: MessageId,
    pub confirm_id: MessageId,
    pub announce_id: MessageId,
    pub ann_endpt_id: MessageId,
    pub request_id: MessageId,
    pub msg_flow_inf: MessageId,
}

impl Default for ControlIds {
    fn default() -> Self {
        ControlIds {
            ping: MessageId::control("ping"),
            pong: MessageId::control("pong"),
            subscribe_to: MessageId::control("subscribTo"),
            unsub_from: MessageId::control("unsubFrom"),
            not_sub_to: MessageId::control("notSubTo"),
            qry_subscrb: MessageId::control("qrySubscrb"),
            qry_subscrp: MessageId::control("qrySubscrp"),
            blob_fragment: MessageId::control("blobFrgmnt"),
            blob_resend: MessageId::control("blobResend"),
            blob_prepare: MessageId::control("blobPrpare"),
            rtr_cert_qry: MessageId::control("rtrCertQry"),
            ept_cert_qry: MessageId::control("eptCertQry"),
            topo_query: MessageId::control("topoQuery"),
            topo_rutr_cn: MessageId::control("topoRutrCn"),
            stats_query: MessageId::control("statsQuery"),
            stats_rutr: MessageId::control("statsRutr"),
            stats_conn: MessageId::control("statsConn"),
            req_rutr_pwd: MessageId::control("reqRutrPwd"),
            enc_rutr_pwd: MessageId::control("encRutrPwd"),
            still_alive: MessageId::control("stillAlive"),
            bye_bye_endp: MessageId::control("byeByeEndp"),
            bye_bye_rutr: MessageId::control("byeByeRutr"),
            bye_bye_brdg: MessageId::control("byeByeBrdg"),
            not_a_router: MessageId::control("notARouter"),
            msg_blk_list: MessageId::control("msgBlkList"),
            msg_alw_list: MessageId::control("msgAlwList"),
            clr_blk_list: MessageId::control("clrBlkList"),
            clr_alw_list: MessageId::control("clrAlwList"),
            assign_id: MessageId::control("assignId"),
            confirm_id: MessageId::control("confirmId"),
            announce_id: MessageId::control("announceId"),
            ann_endpt_id: MessageId::control("annEndptId"),
            request_id: MessageId::control("requestId"),
            msg_flow_inf: MessageId::control("msgFlowInf"),
        }
    }
}
