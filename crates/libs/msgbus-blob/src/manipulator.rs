use std::time::{Duration, Instant};

use msgbus_storage::BufferPool;
use msgbus_wire::{EndpointId, MessageHeader, MessageId, MessagePriority, MessageView};

use crate::error::BlobError;
use crate::ids::{BlobIdSequence, SourceBlobId, TargetBlobId};
use crate::incoming::PendingIncoming;
use crate::info::BlobInfo;
use crate::io::{SourceBlobIo, TargetBlobIo};
use crate::outgoing::{fragment_payload_size, PendingOutgoing};
use crate::wire::{
    decode_fragment, decode_prepare, decode_resend, encode_fragment, encode_prepare, encode_resend,
    FragmentHeader, PreparePayload, ResendRequest,
};

/// Largest total BLOB size the manipulator will accept, either to send or
/// to receive.
pub const DEFAULT_SIZE_CAP_BYTES: i64 = 128 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BlobManipulatorConfig {
    pub size_cap_bytes: i64,
}

impl Default for BlobManipulatorConfig {
    fn default() -> Self {
        BlobManipulatorConfig {
            size_cap_bytes: DEFAULT_SIZE_CAP_BYTES,
        }
    }
}

/// Looks up or creates the target-IO for a newly-observed incoming BLOB.
/// Takes `(msg_id, total_size, source_id)`; returns `None` to reject the
/// transfer outright (e.g. because the caller has no handler for this
/// message id).
pub type TargetIoGetter<'a> =
    dyn FnMut(&MessageId, i64, EndpointId) -> Option<Box<dyn TargetBlobIo>> + 'a;

/// A callback used to emit a fragment/resend/prepare control message. The
/// same shape the router's forwarding path uses for `send`, so the
/// manipulator never needs a back-reference to its owner.
pub type SendFn<'a> = dyn FnMut(&MessageId, &MessageView<'_>) -> bool + 'a;

/// Fragments outgoing BLOBs and reassembles incoming ones. Owns no
/// connection; every send goes through a caller-supplied closure.
pub struct BlobManipulator {
    config: BlobManipulatorConfig,
    fragment_msg_id: MessageId,
    resend_msg_id: MessageId,
    prepare_msg_id: MessageId,
    id_sequence: BlobIdSequence,
    outgoing: Vec<PendingOutgoing>,
    outgoing_index: usize,
    incoming: Vec<PendingIncoming>,
    buffer_pool: BufferPool,
}

impl BlobManipulator {
    pub fn new(
        fragment_msg_id: MessageId,
        resend_msg_id: MessageId,
        prepare_msg_id: MessageId,
        config: BlobManipulatorConfig,
    ) -> Self {
        BlobManipulator {
            config,
            fragment_msg_id,
            resend_msg_id,
            prepare_msg_id,
            id_sequence: BlobIdSequence::default(),
            outgoing: Vec::new(),
            outgoing_index: 0,
            incoming: Vec::new(),
            buffer_pool: BufferPool::new(),
        }
    }

    pub fn next_target_blob_id(&mut self) -> TargetBlobId {
        self.id_sequence.next_target()
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Queues a BLOB for transmission. Returns `None` if the source-IO
    /// reports a non-positive size or exceeds the configured cap.
    pub fn push_outgoing(
        &mut self,
        msg_id: MessageId,
        source_id: EndpointId,
        target_id: EndpointId,
        target_blob_id: TargetBlobId,
        io: Box<dyn SourceBlobIo>,
        max_time: Duration,
        priority: MessagePriority,
    ) -> Option<SourceBlobId> {
        let total_size = io.total_size();
        if total_size <= 0 || total_size > self.config.size_cap_bytes {
            return None;
        }
        let source_blob_id = self.id_sequence.next_source();
        let now = Instant::now();
        self.outgoing.push(PendingOutgoing {
            source_blob_id,
            msg_id,
            source_id,
            target_id,
            target_blob_id,
            io,
            total_size,
            priority,
            todo: crate::rangeset::RangeSet::full(total_size),
            max_time,
            started_at: now,
            last_activity: now,
            previous_progress: 0.0,
        });
        Some(source_blob_id)
    }

    /// Registers a receive entry for an expected incoming BLOB, before its
    /// first fragment has arrived. `source_id` may be
    /// `EndpointId::BROADCAST` to accept the first sender that offers a
    /// matching `(msg_id, target_blob_id)`, which then binds the entry to
    /// that sender. Returns `false` (and creates no entry) if `total_size`
    /// exceeds the cap — this protects the receiver's buffer pool.
    pub fn expect_incoming(
        &mut self,
        msg_id: MessageId,
        source_id: EndpointId,
        target_blob_id: TargetBlobId,
        total_size: i64,
        io: Box<dyn TargetBlobIo>,
        max_time: Duration,
    ) -> bool {
        if total_size <= 0 || total_size > self.config.size_cap_bytes {
            return false;
        }
        let now = Instant::now();
        self.incoming.push(PendingIncoming {
            msg_id,
            source_blob_id: None,
            target_blob_id,
            source_id,
            io,
            total_size,
            done: crate::rangeset::RangeSet::new(),
            created_at: now,
            max_time,
            latest_update: now,
        });
        true
    }

    /// Finds the receive entry for a fragment: first by
    /// the already-bound `(source_id, source_blob_id)` pair, else by
    /// `(msg_id, target_blob_id, source_id-or-broadcast)` — binding the
    /// entry to this sender if that's what matched.
    fn find_incoming_index(
        &mut self,
        msg_id: &MessageId,
        source_id: EndpointId,
        source_blob_id: SourceBlobId,
        target_blob_id: TargetBlobId,
    ) -> Option<usize> {
        if let Some(idx) = self
            .incoming
            .iter()
            .position(|p| p.matches_bound(source_id, source_blob_id))
        {
            return Some(idx);
        }
        let idx = self
            .incoming
            .iter()
            .position(|p| p.matches_unbound(msg_id, target_blob_id, source_id))?;
        self.incoming[idx].bind(source_id, source_blob_id);
        Some(idx)
    }

    /// Feeds one `"blobFrgmnt"` payload into the manipulator. `get_io` is
    /// consulted only when no existing receive entry matches, and only
    /// when `source_id` is not broadcast.
    pub fn process_incoming_fragment(
        &mut self,
        msg_id: &MessageId,
        source_id: EndpointId,
        age: msgbus_wire::AgeQuarterSeconds,
        payload: &[u8],
        get_io: &mut TargetIoGetter<'_>,
    ) -> Result<bool, BlobError> {
        let (header, data) = decode_fragment(payload)?;
        let FragmentHeader {
            source_blob_id,
            target_blob_id,
            offset,
            total_size,
            ..
        } = header;

        let idx = match self.find_incoming_index(msg_id, source_id, source_blob_id, target_blob_id)
        {
            Some(idx) => Some(idx),
            None if !source_id.is_broadcast() => {
                if total_size > self.config.size_cap_bytes {
                    return Err(BlobError::SizeCapExceeded {
                        total_size,
                        cap: self.config.size_cap_bytes,
                    });
                }
                match get_io(msg_id, total_size, source_id) {
                    Some(io) => {
                        let now = Instant::now();
                        self.incoming.push(PendingIncoming {
                            msg_id: *msg_id,
                            source_blob_id: Some(source_blob_id),
                            target_blob_id,
                            source_id,
                            io,
                            total_size,
                            done: crate::rangeset::RangeSet::new(),
                            created_at: now,
                            max_time: Duration::from_secs(30),
                            latest_update: now,
                        });
                        Some(self.incoming.len() - 1)
                    }
                    None => None,
                }
            }
            None => None,
        };

        let Some(idx) = idx else {
            return Ok(false);
        };

        let entry = &mut self.incoming[idx];
        entry.merge_fragment(offset, data);
        entry.latest_update = Instant::now();

        if entry.is_complete() {
            let mut entry = self.incoming.remove(idx);
            let info = BlobInfo {
                msg_id: msg_id.clone(),
                source_id: entry.source_id,
                total_size: entry.total_size,
            };
            entry.io.handle_finished(msg_id, age, &info);
        }
        Ok(true)
    }

    /// Feeds one `"blobResend"` payload: merges the requested range back
    /// into the matching outgoing BLOB's todo set.
    pub fn process_resend(&mut self, payload: &[u8]) -> Result<bool, BlobError> {
        let ResendRequest {
            source_blob_id,
            begin,
            end,
        } = decode_resend(payload)?;
        let Some(pending) = self
            .outgoing
            .iter_mut()
            .find(|p| p.source_blob_id == source_blob_id)
        else {
            return Ok(false);
        };
        pending.merge_resend(begin as i64, end as i64);
        Ok(true)
    }

    /// Feeds one `"blobPrpare"` payload: forwards the sender's reported
    /// progress to the matching receive entry's target-IO via
    /// `handle_prepared`.
    pub fn process_incoming_prepare(&mut self, payload: &[u8]) -> Result<bool, BlobError> {
        let PreparePayload {
            target_blob_id,
            progress,
        } = decode_prepare(payload)?;
        let Some(entry) = self
            .incoming
            .iter_mut()
            .find(|p| p.target_blob_id == target_blob_id)
        else {
            return Ok(false);
        };
        entry.handle_prepared(progress);
        Ok(true)
    }

    /// Round-robins through queued outgoing BLOBs, sending at most one
    /// fragment per BLOB touched this call, up to `max_messages` BLOBs
    /// total. Returns whether anything was sent.
    pub fn process_outgoing(
        &mut self,
        send: &mut SendFn<'_>,
        max_message_size: usize,
        max_messages: usize,
    ) -> bool {
        let mut something_done = false;
        let count = self.outgoing.len();
        let attempts = max_messages.min(count);
        for _ in 0..attempts {
            if self.outgoing.is_empty() {
                break;
            }
            let idx = self.outgoing_index % self.outgoing.len();
            self.outgoing_index = self.outgoing_index.wrapping_add(1);

            if let Some(status) = self.outgoing[idx].io.prepare() {
                if status.finished && !self.outgoing[idx].sent_everything() {
                    something_done |= self.send_next_fragment(idx, send, max_message_size);
                } else if !status.finished {
                    something_done |= self.send_prepare_progress(idx, send, status.progress);
                }
            } else if !self.outgoing[idx].sent_everything() {
                something_done |= self.send_next_fragment(idx, send, max_message_size);
            }
        }
        something_done
    }

    fn send_next_fragment(
        &mut self,
        idx: usize,
        send: &mut SendFn<'_>,
        max_message_size: usize,
    ) -> bool {
        let priority = self.outgoing[idx].priority;
        let payload_cap = fragment_payload_size(priority, max_message_size);
        let mut buf = self.buffer_pool.acquire(payload_cap);
        let offset = self.outgoing[idx].next_fragment(&mut buf, payload_cap);
        let Some(offset) = offset else {
            self.buffer_pool.release(buf);
            return false;
        };
        let pending = &self.outgoing[idx];
        let frame = encode_fragment(
            &FragmentHeader {
                source_blob_id: pending.source_blob_id,
                target_blob_id: pending.target_blob_id,
                offset,
                total_size: pending.total_size,
                options: 0,
            },
            &buf,
        );
        self.buffer_pool.release(buf);
        let mut header = MessageHeader::new(
            self.fragment_msg_id,
            pending.source_id,
            pending.target_id,
        );
        header.priority = priority;
        let view = MessageView::new(&header, &frame);
        let sent = send(&self.fragment_msg_id, &view);
        self.outgoing[idx].last_activity = Instant::now();
        sent
    }

    fn send_prepare_progress(
        &mut self,
        idx: usize,
        send: &mut SendFn<'_>,
        progress: f32,
    ) -> bool {
        let pending = &mut self.outgoing[idx];
        if progress < 1.0 && progress - pending.previous_progress < 0.001 {
            return false;
        }
        pending.previous_progress = progress;
        let payload = encode_prepare(&PreparePayload {
            target_blob_id: pending.target_blob_id,
            progress,
        });
        let mut header =
            MessageHeader::new(self.prepare_msg_id, pending.source_id, pending.target_id);
        header.priority = MessagePriority::Normal;
        let view = MessageView::new(&header, &payload);
        send(&self.prepare_msg_id, &view)
    }

    /// Drops expired outgoing/incoming entries (calling `handle_cancelled`
    /// for the latter) and emits resend requests for incoming entries
    /// with a stale gap. Returns whether anything happened.
    pub fn do_maintenance(&mut self, send: &mut SendFn<'_>, max_message_size: usize) -> bool {
        let mut something_done = false;
        let now = Instant::now();

        let before = self.outgoing.len();
        self.outgoing.retain(|p| !p.is_expired(now));
        something_done |= self.outgoing.len() != before;

        let mut still_incoming = Vec::with_capacity(self.incoming.len());
        for mut entry in self.incoming.drain(..) {
            if entry.is_expired(now) {
                entry.io.handle_cancelled();
                something_done = true;
                continue;
            }
            still_incoming.push(entry);
        }
        self.incoming = still_incoming;

        for entry in &mut self.incoming {
            let Some(source_blob_id) = entry.source_blob_id else {
                continue;
            };
            if !entry.due_for_resend(now) {
                continue;
            }
            if let Some((begin, end)) = entry.next_resend_gap(max_message_size) {
                let payload = encode_resend(&ResendRequest {
                    source_blob_id,
                    begin: begin as u64,
                    end: end as u64,
                });
                let mut header = MessageHeader::new(
                    self.resend_msg_id,
                    EndpointId::BROADCAST,
                    entry.source_id,
                );
                header.priority = MessagePriority::Normal;
                let view = MessageView::new(&header, &payload);
                if send(&self.resend_msg_id, &view) {
                    entry.latest_update = now;
                    something_done = true;
                }
            }
        }

        something_done
    }
}
