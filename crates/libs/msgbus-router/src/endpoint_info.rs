use std::collections::HashSet;
use std::time::Instant;

use msgbus_wire::{MessageId, ProcessInstanceId};

/// What the router has learned about a peer's subscriptions. Forgotten if the peer goes silent past its
/// outdated-timeout without re-announcing.
pub struct EndpointInfo {
    pub instance_id: Option<ProcessInstanceId>,
    pub subscribed: HashSet<MessageId>,
    pub unsubscribed: HashSet<MessageId>,
    pub last_seen: Instant,
}

impl Default for EndpointInfo {
    fn default() -> Self {
        EndpointInfo {
            instance_id: None,
            subscribed: HashSet::new(),
            unsubscribed: HashSet::new(),
            last_seen: Instant::now(),
        }
    }
}

impl EndpointInfo {
    pub fn is_outdated(&self, timeout: std::time::Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Applies a freshly-observed process instance id: if it differs from
    /// the one on file, the peer restarted, so subscription state is
    /// cleared before the new value is recorded.
    pub fn observe_instance(&mut self, instance_id: ProcessInstanceId) {
        if self.instance_id != Some(instance_id) {
            self.subscribed.clear();
            self.unsubscribed.clear();
            self.instance_id = Some(instance_id);
        }
        self.touch();
    }

    pub fn subscribe(&mut self, msg_id: MessageId) {
        self.unsubscribed.remove(&msg_id);
        self.subscribed.insert(msg_id);
        self.touch();
    }

    pub fn unsubscribe(&mut self, msg_id: MessageId) {
        self.subscribed.remove(&msg_id);
        self.unsubscribed.insert(msg_id);
        self.touch();
    }

    pub fn is_subscribed(&self, msg_id: &MessageId) -> bool {
        self.subscribed.contains(msg_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> MessageId {
        MessageId::new("app", s).unwrap()
    }

    #[test]
    fn instance_change_clears_subscriptions() {
        let mut info = EndpointInfo::default();
        info.observe_instance(ProcessInstanceId(1));
        info.subscribe(id("a"));
        assert!(info.is_subscribed(&id("a")));

        info.observe_instance(ProcessInstanceId(2));
        assert!(!info.is_subscribed(&id("a")));
    }

    #[test]
    fn subscribe_then_unsubscribe_is_unsubscribed_regardless_of_order() {
        let mut info = EndpointInfo::default();
        info.subscribe(id("a"));
        info.unsubscribe(id("a"));
        assert!(!info.is_subscribed(&id("a")));
        assert!(info.unsubscribed.contains(&id("a")));

        info.unsubscribe(id("b"));
        info.subscribe(id("b"));
        assert!(info.is_subscribed(&id("b")));
    }
}
