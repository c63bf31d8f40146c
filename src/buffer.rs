//! Fixed-capacity circular byte buffer.
//!
//! [`RingBuffer`] is the staging store behind every connection handler: one
//! instance buffers received bytes until the framing codec can extract
//! complete frames, another stages outbound bytes until the socket drain
//! picks them up. The capacity is fixed at construction and [`reset`] never
//! reallocates, which is what lets a handler be recycled without touching
//! the allocator.
//!
//! Not safe for concurrent use; each buffer is exclusively owned by one
//! connection handler.
//!
//! [`reset`]: RingBuffer::reset
//!
//! # Example
//!
//! ```
//! use tcpmux::RingBuffer;
//!
//! let mut ring = RingBuffer::with_capacity(8);
//! ring.append(b"hello").unwrap();
//!
//! let mut out = [0u8; 8];
//! let n = ring.take(&mut out);
//! assert_eq!(&out[..n], b"hello");
//! ```

use crate::error::{MuxError, Result};

/// Circular byte buffer with wrap-around append/peek/take.
///
/// Cursors satisfy `end = (begin + len) % capacity` and `0 <= len <= capacity`
/// at all times.
pub struct RingBuffer {
    buf: Vec<u8>,
    begin: usize,
    end: usize,
    len: usize,
}

impl RingBuffer {
    /// Create an empty ring buffer with a fixed capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![0u8; capacity],
            begin: 0,
            end: 0,
            len: 0,
        }
    }

    /// Number of bytes currently buffered.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check whether the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed capacity chosen at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes that can still be appended.
    #[inline]
    pub fn available(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Copy `data` into the buffer, wrapping across the capacity boundary
    /// when needed.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::BufferOverflow`] and leaves the buffer unchanged
    /// if `data` does not fit into the free space.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        let cap = self.buf.len();
        if self.len + data.len() > cap {
            return Err(MuxError::BufferOverflow {
                requested: data.len(),
                available: self.available(),
            });
        }

        if self.end + data.len() <= cap {
            self.buf[self.end..self.end + data.len()].copy_from_slice(data);
        } else {
            let first = cap - self.end;
            self.buf[self.end..].copy_from_slice(&data[..first]);
            self.buf[..data.len() - first].copy_from_slice(&data[first..]);
        }

        self.end = (self.end + data.len()) % cap;
        self.len += data.len();
        Ok(())
    }

    /// Copy up to `dst.len()` buffered bytes into `dst` without consuming
    /// them. Returns the number of bytes copied, `min(len, dst.len())`.
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        let cap = self.buf.len();
        let count = self.len.min(dst.len());

        if self.begin + count <= cap {
            dst[..count].copy_from_slice(&self.buf[self.begin..self.begin + count]);
        } else {
            let first = cap - self.begin;
            dst[..first].copy_from_slice(&self.buf[self.begin..]);
            dst[first..count].copy_from_slice(&self.buf[..count - first]);
        }

        count
    }

    /// Discard `count` bytes from the front of the buffer.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the buffered length; staying within bounds
    /// is the caller's responsibility.
    pub fn skip(&mut self, count: usize) {
        assert!(count <= self.len, "skip beyond buffered length");
        self.begin = (self.begin + count) % self.buf.len();
        self.len -= count;
    }

    /// Copy out and consume up to `dst.len()` bytes.
    ///
    /// Equivalent to [`peek`](Self::peek) followed by a
    /// [`skip`](Self::skip) of the copied count.
    pub fn take(&mut self, dst: &mut [u8]) -> usize {
        let count = self.peek(dst);
        self.skip(count);
        count
    }

    /// Restore the empty state for reuse without reallocating the backing
    /// storage.
    pub fn reset(&mut self) {
        self.begin = 0;
        self.end = 0;
        self.len = 0;
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.buf.len())
            .field("begin", &self.begin)
            .field("end", &self.end)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_take_roundtrip() {
        let mut ring = RingBuffer::with_capacity(16);
        ring.append(b"hello world").unwrap();
        assert_eq!(ring.len(), 11);
        assert_eq!(ring.available(), 5);

        let mut out = [0u8; 16];
        let n = ring.take(&mut out);
        assert_eq!(&out[..n], b"hello world");
        assert!(ring.is_empty());
        assert_eq!(ring.available(), 16);
    }

    #[test]
    fn test_fifo_order_across_wraparound() {
        let mut ring = RingBuffer::with_capacity(8);

        // Push the cursors close to the boundary, then wrap.
        ring.append(b"abcdef").unwrap();
        let mut out = [0u8; 4];
        assert_eq!(ring.take(&mut out), 4);
        assert_eq!(&out, b"abcd");

        // begin=4, end=6: this append crosses the capacity boundary.
        ring.append(b"ghijk").unwrap();
        assert_eq!(ring.len(), 7);

        let mut all = [0u8; 8];
        let n = ring.take(&mut all);
        assert_eq!(&all[..n], b"efghijk");
    }

    #[test]
    fn test_interleaved_appends_preserve_fifo() {
        let mut ring = RingBuffer::with_capacity(8);
        let mut expected = Vec::new();
        let mut produced = Vec::new();
        let mut out = [0u8; 3];

        for round in 0u8..50 {
            let chunk = [round, round.wrapping_add(1), round.wrapping_add(2)];
            ring.append(&chunk).unwrap();
            expected.extend_from_slice(&chunk);

            let n = ring.take(&mut out);
            produced.extend_from_slice(&out[..n]);
        }
        while !ring.is_empty() {
            let n = ring.take(&mut out);
            produced.extend_from_slice(&out[..n]);
        }

        assert_eq!(produced, expected);
    }

    #[test]
    fn test_overflow_leaves_state_unchanged() {
        let mut ring = RingBuffer::with_capacity(8);
        ring.append(b"abcde").unwrap();

        let result = ring.append(b"fghi"); // 5 + 4 > 8
        assert!(matches!(
            result,
            Err(MuxError::BufferOverflow {
                requested: 4,
                available: 3
            })
        ));

        // Buffered content must be intact.
        assert_eq!(ring.len(), 5);
        let mut out = [0u8; 8];
        let n = ring.take(&mut out);
        assert_eq!(&out[..n], b"abcde");
    }

    #[test]
    fn test_append_exactly_to_capacity() {
        let mut ring = RingBuffer::with_capacity(4);
        ring.append(b"abcd").unwrap();
        assert_eq!(ring.available(), 0);
        assert!(ring.append(b"x").is_err());

        let mut out = [0u8; 4];
        assert_eq!(ring.take(&mut out), 4);
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = RingBuffer::with_capacity(8);
        ring.append(b"abc").unwrap();

        let mut out = [0u8; 2];
        assert_eq!(ring.peek(&mut out), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(ring.len(), 3);

        // Peek larger than buffered returns only what is held.
        let mut big = [0u8; 8];
        assert_eq!(ring.peek(&mut big), 3);
        assert_eq!(&big[..3], b"abc");
    }

    #[test]
    fn test_peek_across_wraparound() {
        let mut ring = RingBuffer::with_capacity(4);
        ring.append(b"abc").unwrap();
        ring.skip(2);
        ring.append(b"def").unwrap(); // wraps: c at index 2, d at 3, e at 0, f at 1

        let mut out = [0u8; 4];
        assert_eq!(ring.peek(&mut out), 4);
        assert_eq!(&out, b"cdef");
    }

    #[test]
    fn test_reset_restores_empty_state() {
        let mut ring = RingBuffer::with_capacity(8);
        ring.append(b"abcdef").unwrap();
        ring.skip(3);

        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.available(), 8);

        // Fully usable after reset.
        ring.append(b"12345678").unwrap();
        let mut out = [0u8; 8];
        assert_eq!(ring.take(&mut out), 8);
        assert_eq!(&out, b"12345678");
    }

    #[test]
    #[should_panic(expected = "skip beyond buffered length")]
    fn test_skip_beyond_length_panics() {
        let mut ring = RingBuffer::with_capacity(4);
        ring.append(b"ab").unwrap();
        ring.skip(3);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let mut ring = RingBuffer::with_capacity(4);
        ring.append(b"").unwrap();
        assert!(ring.is_empty());
    }
}
