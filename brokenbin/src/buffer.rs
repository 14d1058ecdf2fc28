use std::io;
use std::ops::Deref;

/// Accumulates input up to a fixed limit.
pub struct InputBuffer<T> {
    inner: Option<T>,
    buffer: Vec<u8>,
    len: usize,
}

impl<T: io::Read> InputBuffer<T> {
    pub fn new(inner: T, limit: usize) -> Self {
        InputBuffer {
            inner: Some(inner),
            buffer: vec![0; limit],
            len: 0,
        }
    }

    /// Do one read into the unused part of the buffer.
    pub fn fill_more(&mut self) -> io::Result<usize> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(0);
        };

        let (_, unused) = self.buffer.split_at_mut(self.len);
        if unused.is_empty() {
            return Ok(0);
        }

        let amount = inner.read(unused)?;

        if amount == 0 {
            // inner is done reading
            self.inner = None;
        }
        self.len += amount;

        Ok(amount)
    }

    pub fn is_ended(&self) -> bool {
        self.inner.is_none()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buffer.len()
    }
}

impl<T> Deref for InputBuffer<T> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.buffer[..self.len]
    }
}
