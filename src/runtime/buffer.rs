//! Fixed-size I/O buffers shared between a session and its in-flight ops.
//!
//! A read or write parked in the reactor must still reach its bytes when the
//! socket becomes ready, so operations hold a clone of the [`IoBuf`] handle
//! rather than a borrow. The buffer is allocated once per session and reused
//! for every read/write cycle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle over a fixed-length byte buffer.
#[derive(Clone)]
pub struct IoBuf {
    bytes: Rc<RefCell<Box<[u8]>>>,
}

impl IoBuf {
    /// Allocate a zeroed buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: Rc::new(RefCell::new(vec![0u8; size].into_boxed_slice())),
        }
    }

    /// Length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the buffer contents.
    ///
    /// # Panics
    /// Panics if called from inside `with_mut` on the same buffer.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.bytes.borrow())
    }

    /// Run `f` against the buffer contents mutably.
    ///
    /// # Panics
    /// Panics if called from inside `with` or `with_mut` on the same buffer.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.bytes.borrow_mut())
    }

    /// Copy `data` into the front of the buffer, truncating to fit.
    ///
    /// Returns the number of bytes copied.
    pub fn fill_from(&self, data: &[u8]) -> usize {
        self.with_mut(|buf| {
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            n
        })
    }

    /// Copy out the first `len` bytes (clamped to the buffer length).
    pub fn to_vec(&self, len: usize) -> Vec<u8> {
        self.with(|buf| buf[..len.min(buf.len())].to_vec())
    }
}

impl fmt::Debug for IoBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBuf").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_zeroed() {
        let buf = IoBuf::new(16);
        assert_eq!(buf.len(), 16);
        assert!(!buf.is_empty());
        assert_eq!(buf.to_vec(16), vec![0u8; 16]);
    }

    #[test]
    fn test_fill_truncates() {
        let buf = IoBuf::new(4);
        assert_eq!(buf.fill_from(b"hello"), 4);
        assert_eq!(buf.to_vec(100), b"hell");
    }

    #[test]
    fn test_clones_share_storage() {
        let buf = IoBuf::new(8);
        let op_handle = buf.clone();
        op_handle.fill_from(b"abc");
        assert_eq!(buf.to_vec(3), b"abc");
    }
}
