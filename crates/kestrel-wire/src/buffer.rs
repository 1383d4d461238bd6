use crate::error::{WireError, WireResult};

/// A contiguous, append-only byte region with a separate read cursor.
///
/// `produced` marks how many bytes have actually been written; `cursor`
/// marks how many of those have been consumed by a reader. Growth is
/// doubling-only so repeated writes amortise to O(log n) reallocations.
/// Backing storage is zeroed on creation and on every grow, which is what
/// lets the gamma decoder treat an unwritten byte as a safe default rather
/// than uninitialised memory.
#[derive(Debug, Clone)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    produced: usize,
    cursor: usize,
}

impl GrowableBuffer {
    pub fn new(initial_capacity: usize) -> Self {
        GrowableBuffer {
            data: vec![0u8; initial_capacity.max(1)],
            produced: 0,
            cursor: 0,
        }
    }

    /// Ensures at least `additional` more bytes can be written without a
    /// further grow.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.produced + additional;
        if needed <= self.data.len() {
            return;
        }
        let mut new_cap = self.data.len().max(1);
        while new_cap < needed {
            new_cap *= 2;
        }
        self.data.resize(new_cap, 0);
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        let end = self.produced + bytes.len();
        self.data[self.produced..end].copy_from_slice(bytes);
        self.produced = end;
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.write_raw(&[byte]);
    }

    /// Reads `n` bytes starting at the cursor, advancing it. Fails if that
    /// would read past the produced region.
    pub fn read_raw(&mut self, n: usize) -> WireResult<&[u8]> {
        if self.cursor + n > self.produced {
            return Err(WireError::Underrun {
                wanted: n,
                available: self.produced.saturating_sub(self.cursor),
            });
        }
        let slice = &self.data[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    pub fn read_byte(&mut self) -> WireResult<u8> {
        Ok(self.read_raw(1)?[0])
    }

    pub fn produced(&self) -> usize {
        self.produced
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.produced - self.cursor
    }

    /// The bytes written so far, regardless of how many have been consumed.
    pub fn as_produced(&self) -> &[u8] {
        &self.data[..self.produced]
    }

    /// Builds a fresh buffer over existing bytes, ready to be consumed by
    /// `read_raw`/`read_byte`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = GrowableBuffer::new(bytes.len());
        buf.write_raw(bytes);
        buf
    }

    pub fn free(self) {
        drop(self);
    }
}
