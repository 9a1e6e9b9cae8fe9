use msgbus_wire::StoredMessage;

struct Entry {
    seq: u64,
    message: StoredMessage,
}

/// A priority queue of [`StoredMessage`]s. Higher-priority messages sort to
/// the front; among equal priorities, insertion order is preserved (FIFO).
#[derive(Default)]
pub struct PriorityQueue {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `message` keeping the queue sorted by `(priority desc,
    /// insertion order asc)`. O(log n) comparisons via binary search, O(n)
    /// for the shift — acceptable for the per-subscription queue depths
    /// this is sized for.
    pub fn push(&mut self, message: StoredMessage) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let priority = message.header.priority;
        let idx = self.entries.partition_point(|e| e.message.header.priority >= priority);
        self.entries.insert(idx, Entry { seq, message });
        let _ = seq;
    }

    /// Removes and returns the highest-priority, oldest message.
    pub fn pop(&mut self) -> Option<StoredMessage> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0).message)
        }
    }

    pub fn peek(&self) -> Option<&StoredMessage> {
        self.entries.first().map(|e| &e.message)
    }

    /// Visits every queued message in priority order, removing the ones for
    /// which `handler` returns `true`. Returns whether anything was removed
    /// (the cooperative "work done this tick" signal).
    pub fn process_all<F>(&mut self, mut handler: F) -> bool
    where
        F: FnMut(&StoredMessage) -> bool,
    {
        let before = self.entries.len();
        let mut i = 0;
        while i < self.entries.len() {
            if handler(&self.entries[i].message) {
                self.entries.remove(i);
            } else {
                i += 1;
            }
        }
        self.entries.len() != before
    }
}
