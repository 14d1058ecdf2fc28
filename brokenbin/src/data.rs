//! Literal fixture data.

use std::iter::repeat_with;
use std::time::Duration;

pub const HEAD_200: &[u8] = b"HTTP/1.1 200 OK\r\n";

/// `/test/8` starts a chunked body with this size.
pub const MALFORMED_CHUNK_SIZE: &str = "-3";
pub const MALFORMED_CHUNK_PAYLOAD: &[u8] = b"akihabara";

pub const DELAY: Duration = Duration::from_secs(1);

pub const RANDOM_BODY_LEN: usize = 128;

/// Gzip of 1338 bytes of utf-8 text.
pub const GZIPPED_BODY: &[u8] = include_bytes!("../assets/lyrics.gz");

pub const GZIP_CHUNK_SIZES: std::ops::RangeInclusive<usize> = 16..=128;

/// `amount` characters of `[A-Z0-9]`.
pub fn random_body(amount: usize, rng: &mut fastrand::Rng) -> Vec<u8> {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    repeat_with(|| CHARS[rng.usize(..CHARS.len())])
        .take(amount)
        .collect()
}
