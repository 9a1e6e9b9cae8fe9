use std::time::{Duration, Instant};

use msgbus_wire::{EndpointId, MessageId};

use crate::ids::{SourceBlobId, TargetBlobId};
use crate::io::TargetBlobIo;
use crate::rangeset::{RangeOp, RangeSet};

/// How long since a receive entry's last update before a resend request
/// may be sent for its remaining gaps.
pub const RESEND_INTERVAL: Duration = Duration::from_millis(250);

pub struct PendingIncoming {
    pub msg_id: MessageId,
    /// `None` until the first matching fragment binds the sender's own
    /// blob id.
    pub source_blob_id: Option<SourceBlobId>,
    pub target_blob_id: TargetBlobId,
    /// `EndpointId::BROADCAST` means "accept from any source"; bound to
    /// the concrete sender on the first matching fragment.
    pub source_id: EndpointId,
    pub io: Box<dyn TargetBlobIo>,
    pub total_size: i64,
    pub done: RangeSet,
    pub created_at: Instant,
    pub max_time: Duration,
    pub latest_update: Instant,
}

impl PendingIncoming {
    /// Binds this entry to a concrete sender and its blob id, on the
    /// first fragment that matches it by `(msg_id, target_blob_id)`.
    pub fn bind(&mut self, source_id: EndpointId, source_blob_id: SourceBlobId) {
        self.source_id = source_id;
        self.source_blob_id = Some(source_blob_id);
    }

    pub fn matches_bound(&self, source_id: EndpointId, source_blob_id: SourceBlobId) -> bool {
        self.source_id == source_id && self.source_blob_id == Some(source_blob_id)
    }

    pub fn matches_unbound(
        &self,
        msg_id: &MessageId,
        target_blob_id: TargetBlobId,
        source_id: EndpointId,
    ) -> bool {
        self.msg_id == *msg_id
            && self.target_blob_id == target_blob_id
            && (self.source_id.is_broadcast() || self.source_id == source_id)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.max_time
    }

    /// Forwards a sender-reported streaming progress to the target-IO.
    pub fn handle_prepared(&mut self, progress: f32) {
        self.io.handle_prepared(progress);
    }

    pub fn is_complete(&self) -> bool {
        self.done.is_complete(self.total_size)
    }

    /// Merges `[offset, offset + data.len())` into the done set, routing
    /// each resulting sub-range to `store_fragment` or `check_stored` on
    /// the target-IO. Idempotent by construction of [`RangeSet::merge`].
    pub fn merge_fragment(&mut self, offset: i64, data: &[u8]) {
        let end = offset + data.len() as i64;
        let ops = self.done.merge(offset, end);
        for op in ops {
            match op {
                RangeOp::New(b, e) => {
                    let slice = &data[(b - offset) as usize..(e - offset) as usize];
                    self.io.store_fragment(b, slice);
                }
                RangeOp::AlreadyDone(b, e) => {
                    let slice = &data[(b - offset) as usize..(e - offset) as usize];
                    self.io.check_stored(b, slice);
                }
            }
        }
    }

    /// Whether enough time has passed since the last update to justify
    /// another resend request for this entry's remaining gaps.
    pub fn due_for_resend(&self, now: Instant) -> bool {
        !self.done.is_empty()
            && !self.is_complete()
            && now.duration_since(self.latest_update) > RESEND_INTERVAL
    }

    /// Picks the first gap in `[0, total_size)`, bounded by
    /// `2 * max_message_size / 3` bytes, matching the original's
    /// "gap before the first done range, else the gap right after it"
    /// selection (the latter falls out naturally since `gaps()` already
    /// yields whichever of the two exists first).
    pub fn next_resend_gap(&self, max_message_size: usize) -> Option<(i64, i64)> {
        let bound = ((2 * max_message_size) / 3).max(1) as i64;
        self.done
            .gaps(self.total_size)
            .into_iter()
            .next()
            .map(|(b, e)| (b, b + (e - b).min(bound)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::BlobInfo;
    use msgbus_wire::{AgeQuarterSeconds, MessageId};
    use std::sync::{Arc, Mutex};

    struct RecordingTarget {
        stored: Arc<Mutex<Vec<(i64, Vec<u8>)>>>,
        checked: Arc<Mutex<Vec<(i64, Vec<u8>)>>>,
    }

    impl TargetBlobIo for RecordingTarget {
        fn store_fragment(&mut self, offset: i64, src: &[u8]) -> bool {
            self.stored.lock().unwrap().push((offset, src.to_vec()));
            true
        }

        fn check_stored(&mut self, offset: i64, src: &[u8]) -> bool {
            self.checked.lock().unwrap().push((offset, src.to_vec()));
            true
        }

        fn handle_finished(
            &mut self,
            _msg_id: &MessageId,
            _age: AgeQuarterSeconds,
            _info: &BlobInfo,
        ) {
        }
    }

    fn make_pending(total_size: i64) -> (PendingIncoming, Arc<Mutex<Vec<(i64, Vec<u8>)>>>, Arc<Mutex<Vec<(i64, Vec<u8>)>>>) {
        let stored = Arc::new(Mutex::new(Vec::new()));
        let checked = Arc::new(Mutex::new(Vec::new()));
        let io = RecordingTarget {
            stored: stored.clone(),
            checked: checked.clone(),
        };
        let now = Instant::now();
        let pending = PendingIncoming {
            msg_id: MessageId::new("app", "blob").unwrap(),
            source_blob_id: Some(SourceBlobId(1)),
            target_blob_id: TargetBlobId(1),
            source_id: EndpointId(5),
            io: Box::new(io),
            total_size,
            done: RangeSet::new(),
            created_at: now,
            max_time: Duration::from_secs(30),
            latest_update: now,
        };
        (pending, stored, checked)
    }

    #[test]
    fn merge_fragment_stores_new_bytes() {
        let (mut pending, stored, checked) = make_pending(10);
        pending.merge_fragment(0, b"0123456789");
        assert_eq!(stored.lock().unwrap().len(), 1);
        assert!(checked.lock().unwrap().is_empty());
        assert!(pending.is_complete());
    }

    #[test]
    fn duplicate_fragment_is_checked_not_stored_again() {
        let (mut pending, stored, checked) = make_pending(10);
        pending.merge_fragment(0, b"0123456789");
        pending.merge_fragment(0, b"0123456789");
        assert_eq!(stored.lock().unwrap().len(), 1);
        assert_eq!(checked.lock().unwrap().len(), 1);
    }

    #[test]
    fn resend_gap_is_bounded() {
        let (mut pending, _stored, _checked) = make_pending(1000);
        pending.merge_fragment(0, &vec![0u8; 100]);
        let gap = pending.next_resend_gap(300).unwrap();
        assert_eq!(gap, (100, 100 + 200));
    }
}
