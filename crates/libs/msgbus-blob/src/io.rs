use msgbus_wire::{AgeQuarterSeconds, MessageId};

use crate::info::{BlobInfo, PrepareStatus};

/// Produces the bytes of an outgoing BLOB. Implementations are expected to
/// be cheap to poll repeatedly: `fetch_fragment` must not block.
pub trait SourceBlobIo: Send {
    fn total_size(&self) -> i64;

    /// Writes up to `dst.len()` bytes starting at `offset` into `dst`,
    /// returning how many were written.
    fn fetch_fragment(&mut self, offset: i64, dst: &mut [u8]) -> usize;

    /// For streaming producers: reports how much of the blob is ready to
    /// be fetched. `None` means "everything up to `total_size` is ready
    /// already" (the common, non-streaming case).
    fn prepare(&mut self) -> Option<PrepareStatus> {
        None
    }
}

/// Consumes the bytes of an incoming BLOB as fragments arrive, possibly
/// out of order.
pub trait TargetBlobIo: Send {
    /// Stores previously-unseen bytes `[offset, offset + src.len())`.
    /// Returns whether the store succeeded; `false` here is treated the
    /// same as a dropped fragment (it stays in the gap set).
    fn store_fragment(&mut self, offset: i64, src: &[u8]) -> bool;

    /// Called instead of `store_fragment` for bytes the manipulator
    /// already considers done (a duplicate or overlapping fragment), so
    /// an implementation that keeps a hash/checksum can verify rather
    /// than re-write. The default accepts unconditionally.
    fn check_stored(&mut self, _offset: i64, _src: &[u8]) -> bool {
        true
    }

    /// Called when a streaming sender's prepare progress advances.
    fn handle_prepared(&mut self, _progress: f32) {}

    fn handle_finished(&mut self, msg_id: &MessageId, age: AgeQuarterSeconds, info: &BlobInfo);

    fn handle_cancelled(&mut self) {}
}

/// A simple in-memory [`SourceBlobIo`] over an owned buffer, useful for
/// tests and for small blobs that do not warrant a streaming producer.
pub struct BufferSourceBlobIo {
    data: Vec<u8>,
}

impl BufferSourceBlobIo {
    pub fn new(data: Vec<u8>) -> Self {
        BufferSourceBlobIo { data }
    }
}

impl SourceBlobIo for BufferSourceBlobIo {
    fn total_size(&self) -> i64 {
        self.data.len() as i64
    }

    fn fetch_fragment(&mut self, offset: i64, dst: &mut [u8]) -> usize {
        if offset < 0 || offset as usize >= self.data.len() {
            return 0;
        }
        let start = offset as usize;
        let n = dst.len().min(self.data.len() - start);
        dst[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }
}

/// A simple in-memory [`TargetBlobIo`] that stores fragments into a
/// pre-sized buffer and hands the finished bytes to a closure.
pub struct BufferTargetBlobIo<F: FnMut(Vec<u8>) + Send> {
    buffer: Vec<u8>,
    on_finished: F,
}

impl<F: FnMut(Vec<u8>) + Send> BufferTargetBlobIo<F> {
    pub fn new(total_size: i64, on_finished: F) -> Self {
        BufferTargetBlobIo {
            buffer: vec![0u8; total_size.max(0) as usize],
            on_finished,
        }
    }
}

impl<F: FnMut(Vec<u8>) + Send> TargetBlobIo for BufferTargetBlobIo<F> {
    fn store_fragment(&mut self, offset: i64, src: &[u8]) -> bool {
        if offset < 0 {
            return false;
        }
        let start = offset as usize;
        let end = start + src.len();
        if end > self.buffer.len() {
            return false;
        }
        self.buffer[start..end].copy_from_slice(src);
        true
    }

    fn handle_finished(&mut self, _msg_id: &MessageId, _age: AgeQuarterSeconds, _info: &BlobInfo) {
        (self.on_finished)(std::mem::take(&mut self.buffer));
    }
}
