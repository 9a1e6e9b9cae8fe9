use std::sync::Mutex;

/// Number of power-of-two size classes the pool recycles buffers in,
/// covering up to 1 MiB (`1 << (CLASSES - 1)`). Larger requests fall
/// through to a fresh allocation.
const CLASSES: usize = 21;

fn size_class(min_capacity: usize) -> usize {
    let min_capacity = min_capacity.max(1);
    (usize::BITS - (min_capacity - 1).leading_zeros()) as usize
}

/// Recycles message/fragment byte buffers so the hot path avoids a fresh
/// heap allocation per message. Acquisition and release are thread-safe;
/// contention is minimized by bucketing per size class rather than behind
/// one global lock.
pub struct BufferPool {
    classes: Vec<Mutex<Vec<Vec<u8>>>>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        let mut classes = Vec::with_capacity(CLASSES);
        for _ in 0..CLASSES {
            classes.push(Mutex::new(Vec::new()));
        }
        BufferPool { classes }
    }

    /// Returns a buffer with at least `min_capacity` bytes of capacity and
    /// zero length, reusing a recycled one if the size class has one.
    pub fn acquire(&self, min_capacity: usize) -> Vec<u8> {
        let class = size_class(min_capacity).min(CLASSES - 1);
        if let Ok(mut bucket) = self.classes[class].lock() {
            if let Some(mut buf) = bucket.pop() {
                buf.clear();
                return buf;
            }
        }
        Vec::with_capacity(1usize << class)
    }

    /// Returns `buf` to the pool, bucketed by its capacity's size class.
    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() == 0 {
            return;
        }
        buf.clear();
        let class = size_class(buf.capacity()).min(CLASSES - 1);
        if let Ok(mut bucket) = self.classes[class].lock() {
            bucket.push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_buffer_has_requested_capacity() {
        let pool = BufferPool::new();
        let buf = pool.acquire(100);
        assert!(buf.capacity() >= 100);
        assert!(buf.is_empty());
    }

    #[test]
    fn released_buffer_is_reused() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire(64);
        buf.extend_from_slice(b"hello");
        let capacity = buf.capacity();
        pool.release(buf);
        let reused = pool.acquire(64);
        assert_eq!(reused.capacity(), capacity);
        assert!(reused.is_empty());
    }
}
