//! Fixed-capacity raw receive buffer

/// Raw bytes captured during one transfer
///
/// Never grows past its capacity; bytes pushed once full are dropped.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl CaptureBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Forget the previous capture
    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
    }

    /// Append one byte; returns false (and drops it) when full
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}
