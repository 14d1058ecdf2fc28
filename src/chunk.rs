//! Chunked transfer encoding.
//!
//! The writing side is deliberately simple: fixtures decide the chunk
//! boundaries themselves. The reading side, [`Dechunker`], is used to verify
//! what a fixture puts on the wire.

use core::ops::RangeInclusive;
use core::str;

use crate::util::find_crlf;
use crate::Error;

/// The terminating zero-size chunk, without trailers.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Append one chunk, `<hex-size>\r\n<payload>\r\n`, to `out`.
///
/// An empty payload is skipped since a zero size would end the body.
pub fn write_chunk(out: &mut Vec<u8>, payload: &[u8]) {
    if payload.is_empty() {
        return;
    }
    out.extend_from_slice(format!("{:x}\r\n", payload.len()).as_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
}

/// Append the terminating chunk.
pub fn write_last_chunk(out: &mut Vec<u8>) {
    out.extend_from_slice(LAST_CHUNK);
}

/// Split `total` bytes into chunk lengths drawn uniformly from `range`.
///
/// The final length is truncated to what is left. Lengths are never 0 and
/// always sum to `total`.
pub fn random_chunk_sizes(
    total: usize,
    range: &RangeInclusive<usize>,
    rng: &mut fastrand::Rng,
) -> Vec<usize> {
    let lo = (*range.start()).max(1);
    let hi = (*range.end()).max(lo);

    let mut sizes = Vec::with_capacity(total / lo + 1);
    let mut left = total;

    while left > 0 {
        let size = rng.usize(lo..=hi).min(left);
        sizes.push(size);
        left -= size;
    }

    sizes
}

/// Incremental parser for a chunked body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dechunker {
    Size,
    Chunk(usize),
    CrLf,
    Ending,
    Trailer,
    Ended,
}

#[derive(Debug)]
struct Pos {
    index_in: usize,
    index_out: usize,
}

impl Dechunker {
    pub fn new() -> Self {
        Dechunker::Size
    }

    /// Parse as much of `src` as possible into `dst`.
    ///
    /// Returns `(input used, output written)`.
    pub fn parse_input(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize), Error> {
        let mut pos = Pos {
            index_in: 0,
            index_out: 0,
        };

        loop {
            let more = match self {
                Dechunker::Size => self.read_size(src, &mut pos)?,
                Dechunker::Chunk(_) => self.read_data(src, dst, &mut pos)?,
                Dechunker::CrLf => self.expect_crlf(src, &mut pos)?,
                Dechunker::Ending => self.trailer_or_ended(src, &mut pos)?,
                Dechunker::Trailer => self.trailer(src, &mut pos)?,
                Dechunker::Ended => false,
            };

            if !more {
                break;
            }
        }

        Ok((pos.index_in, pos.index_out))
    }

    /// Decode an entire chunked body in one go.
    pub fn decode(src: &[u8]) -> Result<Vec<u8>, Error> {
        let mut d = Dechunker::new();
        let mut out = vec![0; src.len()];

        let (_, written) = d.parse_input(src, &mut out)?;

        if !d.is_ended() {
            return Err(Error::ChunkedBodyIncomplete);
        }

        out.truncate(written);
        Ok(out)
    }

    #[cfg(test)]
    fn left(&self) -> usize {
        if let Self::Chunk(l) = self {
            *l
        } else {
            0
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }

    fn read_size(&mut self, src: &[u8], pos: &mut Pos) -> Result<bool, Error> {
        const SANITY_CHECK: usize = 20;

        let src = &src[pos.index_in..];

        let i = match find_crlf(src) {
            Some(v) => v,
            // No crlf can end the size line within the limit any more.
            None if src.len() > SANITY_CHECK + 1 => return Err(Error::ChunkExpectedCrLf),
            None => return Ok(false),
        };

        if i > SANITY_CHECK {
            return Err(Error::ChunkExpectedCrLf);
        }
        let maybe_meta = src[..i].iter().position(|c| *c == b';');

        let len_end = maybe_meta.unwrap_or(i);
        let len_str = str::from_utf8(&src[..len_end]).map_err(|_| Error::ChunkLenNotAscii)?;

        // 1*HEXDIG, which rules out the sign from_str_radix would take.
        let digits = len_str.trim_end_matches([' ', '\t']);
        if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
            debug!("chunk size {:?} is not hex", len_str);
            return Err(Error::ChunkLenNotANumber);
        }

        let len = usize::from_str_radix(digits, 16).map_err(|e| {
            debug!("chunk size {:?}: {}", len_str, e);
            Error::ChunkLenNotANumber
        })?;

        pos.index_in += i + 2;
        *self = if len == 0 {
            Self::Ending
        } else {
            Self::Chunk(len)
        };

        Ok(true)
    }

    fn read_data(&mut self, src: &[u8], dst: &mut [u8], pos: &mut Pos) -> Result<bool, Error> {
        let src = &src[pos.index_in..];
        let dst = &mut dst[pos.index_out..];

        let left = match self {
            Self::Chunk(v) => v,
            _ => unreachable!(),
        };

        // Smallest of input, output or what is left of the chunk.
        let to_read = src.len().min(dst.len()).min(*left);

        dst[..to_read].copy_from_slice(&src[..to_read]);
        pos.index_in += to_read;
        pos.index_out += to_read;
        *left -= to_read;

        if *left == 0 {
            *self = Self::CrLf;
        }

        Ok(to_read > 0)
    }

    fn expect_crlf(&mut self, src: &[u8], pos: &mut Pos) -> Result<bool, Error> {
        let src = &src[pos.index_in..];

        if src.len() < 2 {
            return Ok(false);
        }

        if &src[..2] != b"\r\n" {
            return Err(Error::ChunkExpectedCrLf);
        }

        pos.index_in += 2;
        *self = Self::Size;

        Ok(true)
    }

    fn trailer_or_ended(&mut self, src: &[u8], pos: &mut Pos) -> Result<bool, Error> {
        let src = &src[pos.index_in..];

        let i = match find_crlf(src) {
            Some(v) => v,
            None => return Ok(false),
        };

        if i == 0 {
            pos.index_in += 2;
            *self = Self::Ended;
        } else {
            *self = Self::Trailer;
        }

        Ok(true)
    }

    fn trailer(&mut self, src: &[u8], pos: &mut Pos) -> Result<bool, Error> {
        let src = &src[pos.index_in..];

        let i = match find_crlf(src) {
            Some(v) => v,
            None => return Ok(false),
        };

        // advance the trailer, and 2 for the crlf.
        pos.index_in += i + 2;
        *self = Self::Ending;

        Ok(true)
    }
}

impl Default for Dechunker {
    fn default() -> Self {
        Self::new()
    }
}
