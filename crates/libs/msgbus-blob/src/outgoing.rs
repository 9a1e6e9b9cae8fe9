use std::time::{Duration, Instant};

use msgbus_wire::{EndpointId, MessageId, MessagePriority};

use crate::ids::{SourceBlobId, TargetBlobId};
use crate::io::SourceBlobIo;
use crate::rangeset::RangeSet;

/// How long a fully-sent BLOB is kept around before being dropped, to
/// absorb a late resend request for bytes that were dropped on the wire.
pub const DEFAULT_LINGER: Duration = Duration::from_secs(1);

/// Fraction of `max_message_size` left for BLOB fragment payload once the
/// fragment's own inner header is accounted for, tuned per priority so
/// higher-priority transfers leave more headroom for competing traffic.
pub fn fragment_payload_size(priority: MessagePriority, max_message_size: usize) -> usize {
    match priority {
        MessagePriority::Critical | MessagePriority::High => max_message_size.saturating_sub(92),
        MessagePriority::Normal => max_message_size * 3 / 4,
        MessagePriority::Low => max_message_size * 2 / 3,
        MessagePriority::Idle => max_message_size / 2,
    }
}

pub struct PendingOutgoing {
    pub source_blob_id: SourceBlobId,
    pub msg_id: MessageId,
    pub source_id: EndpointId,
    pub target_id: EndpointId,
    pub target_blob_id: TargetBlobId,
    pub io: Box<dyn SourceBlobIo>,
    pub total_size: i64,
    pub priority: MessagePriority,
    pub todo: RangeSet,
    pub max_time: Duration,
    pub started_at: Instant,
    pub last_activity: Instant,
    pub previous_progress: f32,
}

impl PendingOutgoing {
    pub fn sent_everything(&self) -> bool {
        self.todo.is_empty()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        if now.duration_since(self.started_at) > self.max_time {
            return true;
        }
        self.sent_everything() && now.duration_since(self.last_activity) > DEFAULT_LINGER
    }

    /// Merges a resend request `[begin, end)` back into the todo set so a
    /// later `process_outgoing` tick retransmits exactly those bytes.
    pub fn merge_resend(&mut self, begin: i64, end: i64) {
        let end = if end <= begin { self.total_size } else { end };
        self.todo.merge(begin, end);
    }

    /// Fetches the next chunk of up to `max_len` bytes from the front of
    /// the todo set into `buf` (resizing it as needed) and removes the
    /// fetched bytes from the todo set. Returns the fragment's offset.
    pub fn next_fragment(&mut self, buf: &mut Vec<u8>, max_len: usize) -> Option<i64> {
        let (start, end) = self.todo.first_range()?;
        let len = ((end - start) as usize).min(max_len.max(1));
        buf.resize(len, 0);
        let written = self.io.fetch_fragment(start, buf);
        if written == 0 {
            return None;
        }
        buf.truncate(written);
        self.todo.remove(start, start + written as i64);
        Some(start)
    }
}
