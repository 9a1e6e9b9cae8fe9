use std::collections::HashSet;
use std::sync::RwLock;

use msgbus_transport::Connection;
use msgbus_wire::MessageId;

/// Per-node allow/block filter sets. Guarded by its own
/// lock so forwarding (shared access, `is_allowed`) never blocks filter
/// edits on an unrelated node, and filter edits on one node never block
/// routing through another.
#[derive(Default)]
pub struct NodeFilters {
    block_list: HashSet<MessageId>,
    allow_list: HashSet<MessageId>,
}

impl NodeFilters {
    /// Special messages are always allowed; otherwise a non-empty
    /// allow-list is authoritative, and only falling back to the
    /// block-list when the allow-list is empty.
    pub fn is_allowed(&self, msg_id: &MessageId) -> bool {
        if msg_id.is_special() {
            return true;
        }
        if !self.allow_list.is_empty() {
            return self.allow_list.contains(msg_id);
        }
        !self.block_list.contains(msg_id)
    }

    pub fn block(&mut self, msg_id: MessageId) {
        self.block_list.insert(msg_id);
    }

    pub fn allow(&mut self, msg_id: MessageId) {
        self.allow_list.insert(msg_id);
    }

    pub fn clear_block_list(&mut self) {
        self.block_list.clear();
    }

    pub fn clear_allow_list(&mut self) {
        self.allow_list.clear();
    }
}

/// A peer promoted out of the pending/admission state machine: it owns
/// its connection and carries the router's view of what it is allowed to
/// receive.
pub struct RoutedNode {
    pub connection: Box<dyn Connection>,
    pub filters: RwLock<NodeFilters>,
    /// Whether this peer should be considered for forwarding of
    /// targeted messages whose destination isn't in the router's index
    ///. Starts `true` for any peer that announced itself
    /// as a router; cleared by `"notARouter"`.
    pub maybe_router: bool,
    /// Set once a bye-bye control message has been received for an
    /// endpoint peer; the node is torn down at the next maintenance
    /// sweep rather than mid-forward.
    pub do_disconnect: bool,
}

impl RoutedNode {
    pub fn new(connection: Box<dyn Connection>, maybe_router: bool) -> Self {
        RoutedNode {
            connection,
            filters: RwLock::new(NodeFilters::default()),
            maybe_router,
            do_disconnect: false,
        }
    }

    pub fn is_allowed(&self, msg_id: &MessageId) -> bool {
        self.filters
            .read()
            .map(|f| f.is_allowed(msg_id))
            .unwrap_or(true)
    }
}
