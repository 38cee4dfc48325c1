use crate::error::{PipelineError, Result};
use std::io::{self, Read};

/// A fixed-capacity byte buffer owned by exactly one stage
///
/// Stages fill it and hand out copies of the filled prefix through
/// [`Provider::pull`](crate::link::Provider::pull); the storage itself is
/// reused for the next chunk and never shared.
#[derive(Debug)]
pub struct StageBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl StageBuffer {
    /// Create a new buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Create the buffer for `stage`, rejecting a zero capacity
    pub fn for_stage(stage: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::Config(format!(
                "stage '{stage}' needs a positive buffer size"
            )));
        }
        Ok(Self::new(capacity))
    }

    /// Append one byte. Returns true if the buffer is now full.
    ///
    /// Pushing into a full buffer is a logic error; callers drain it as soon
    /// as this returns true.
    pub fn push(&mut self, byte: u8) -> bool {
        debug_assert!(!self.is_full(), "push into a full StageBuffer");
        self.data[self.len] = byte;
        self.len += 1;
        self.is_full()
    }

    /// Copy as many bytes of `bytes` as fit. Returns the number copied.
    pub fn extend_from(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining());
        self.data[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        n
    }

    /// Replace the contents with up to `capacity` bytes from `reader`.
    ///
    /// Keeps reading until the buffer is full or the reader reports end of
    /// input, so short reads from pipes never split a multi-byte unit. An
    /// error after some bytes arrived ends the fill early; the reader is
    /// expected to report it again on the next call.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        self.len = 0;
        while !self.is_full() {
            match reader.read(&mut self.data[self.len..]) {
                Ok(0) => break,
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) if self.len > 0 => break,
                Err(e) => return Err(e),
            }
        }
        Ok(self.len)
    }

    /// The filled prefix
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Forget the contents, keeping the storage
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Get the number of filled bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.len
    }
}
