use std::borrow::Cow;
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::chunk::{random_chunk_sizes, write_chunk, write_last_chunk};

/// Status line and headers for the response variants that frame their own body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    status: u16,
    reason: &'static str,
    headers: Vec<(&'static str, &'static str)>,
}

impl ResponseHead {
    pub fn new(status: u16, reason: &'static str) -> Self {
        ResponseHead {
            status,
            reason,
            headers: vec![],
        }
    }

    /// `HTTP/1.1 200 OK`
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// Add a header. Headers are written in the order they are added.
    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(&'static str, &'static str)] {
        &self.headers
    }

    /// Write status line, own headers, `extra` headers and the empty line.
    fn write_to(&self, extra: &[(&'static str, &'static str)], out: &mut Vec<u8>) {
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).as_bytes());
        for (name, value) in self.headers.iter().chain(extra.iter()) {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
    }
}

/// How one request path is answered.
#[derive(Debug, Clone)]
pub enum ResponseSpec {
    /// Bytes sent verbatim.
    Raw(Cow<'static, [u8]>),

    /// Bytes sent in two halves with a pause in between.
    SplitDelayed {
        bytes: Cow<'static, [u8]>,
        delay: Duration,
    },

    /// A chunked body. `malformed_size` replaces the size of the first chunk,
    /// after which nothing more is sent.
    Chunked {
        head: ResponseHead,
        chunks: Vec<&'static [u8]>,
        malformed_size: Option<&'static str>,
    },

    /// A gzip body delimited by connection close.
    GzipWhole {
        head: ResponseHead,
        body: &'static [u8],
    },

    /// A gzip body sent chunked, chunk lengths drawn from `chunk_sizes`.
    GzipChunked {
        head: ResponseHead,
        body: &'static [u8],
        chunk_sizes: RangeInclusive<usize>,
    },
}

/// One unit of a transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Write these bytes in a single write.
    Send(Vec<u8>),
    /// Stall the connection.
    Pause(Duration),
}

impl ResponseSpec {
    pub fn raw(bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        ResponseSpec::Raw(bytes.into())
    }

    pub fn split_delayed(bytes: impl Into<Cow<'static, [u8]>>, delay: Duration) -> Self {
        ResponseSpec::SplitDelayed {
            bytes: bytes.into(),
            delay,
        }
    }

    /// Turn the spec into the steps to perform on the connection.
    ///
    /// The random source is only used by [`ResponseSpec::GzipChunked`].
    pub fn transmission(&self, rng: &mut fastrand::Rng) -> Vec<Step> {
        match self {
            ResponseSpec::Raw(bytes) => vec![Step::Send(bytes.to_vec())],

            ResponseSpec::SplitDelayed { bytes, delay } => {
                let mid = bytes.len() / 2;
                vec![
                    Step::Send(bytes[..mid].to_vec()),
                    Step::Pause(*delay),
                    Step::Send(bytes[mid..].to_vec()),
                ]
            }

            ResponseSpec::Chunked {
                head,
                chunks,
                malformed_size,
            } => {
                let mut out = vec![];
                head.write_to(&[("Transfer-Encoding", "chunked")], &mut out);

                if let Some(size) = malformed_size {
                    out.extend_from_slice(size.as_bytes());
                    out.extend_from_slice(b"\r\n");
                    if let Some(first) = chunks.first() {
                        out.extend_from_slice(first);
                    }
                    return vec![Step::Send(out)];
                }

                for chunk in chunks {
                    write_chunk(&mut out, chunk);
                }
                write_last_chunk(&mut out);

                vec![Step::Send(out)]
            }

            ResponseSpec::GzipWhole { head, body } => {
                let mut out = vec![];
                head.write_to(&[("Content-Encoding", "gzip")], &mut out);
                out.extend_from_slice(body);
                vec![Step::Send(out)]
            }

            ResponseSpec::GzipChunked {
                head,
                body,
                chunk_sizes,
            } => {
                let mut out = vec![];
                head.write_to(
                    &[("Transfer-Encoding", "chunked"), ("Content-Encoding", "gzip")],
                    &mut out,
                );

                let mut steps = vec![Step::Send(out)];

                let mut pos = 0;
                for size in random_chunk_sizes(body.len(), chunk_sizes, rng) {
                    let mut chunk = vec![];
                    write_chunk(&mut chunk, &body[pos..pos + size]);
                    steps.push(Step::Send(chunk));
                    pos += size;
                }

                let mut last = vec![];
                write_last_chunk(&mut last);
                steps.push(Step::Send(last));

                steps
            }
        }
    }

    /// All bytes the transmission sends, pauses left out.
    pub fn wire_bytes(&self, rng: &mut fastrand::Rng) -> Vec<u8> {
        let mut out = vec![];
        for step in self.transmission(rng) {
            if let Step::Send(bytes) = step {
                out.extend_from_slice(&bytes);
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;
    use crate::chunk::Dechunker;

    fn rng() -> fastrand::Rng {
        fastrand::Rng::with_seed(7)
    }

    /// Split a response into head and body at the first empty line.
    fn split_head(bytes: &[u8]) -> (&[u8], &[u8]) {
        let i = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        (&bytes[..i + 4], &bytes[i + 4..])
    }

    #[test]
    fn raw_is_verbatim() {
        let spec = ResponseSpec::raw(&b"HTTP1.1 OK\r\n"[..]);
        assert_eq!(
            spec.transmission(&mut rng()),
            vec![Step::Send(b"HTTP1.1 OK\r\n".to_vec())]
        );
    }

    #[test]
    fn split_delayed_halves() {
        const BYTES: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nJavaScript";
        let spec = ResponseSpec::split_delayed(BYTES, Duration::from_secs(1));
        let steps = spec.transmission(&mut rng());

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], Step::Send(BYTES[..BYTES.len() / 2].to_vec()));
        assert_eq!(steps[1], Step::Pause(Duration::from_secs(1)));
        assert_eq!(spec.wire_bytes(&mut rng()), BYTES);
    }

    #[test]
    fn split_delayed_odd_length() {
        let spec = ResponseSpec::split_delayed(&b"abc"[..], Duration::ZERO);
        let steps = spec.transmission(&mut rng());
        assert_eq!(steps[0], Step::Send(b"a".to_vec()));
        assert_eq!(steps[2], Step::Send(b"bc".to_vec()));
    }

    #[test]
    fn chunked_framing() -> Result<(), crate::Error> {
        let spec = ResponseSpec::Chunked {
            head: ResponseHead::ok().header("Connection", "Close"),
            chunks: vec![&b"Hyoka C"[..], &b"hitanda Eru\r\n"[..]],
            malformed_size: None,
        };
        let bytes = spec.wire_bytes(&mut rng());
        let (head, body) = split_head(&bytes);

        assert_eq!(
            head,
            b"HTTP/1.1 200 OK\r\nConnection: Close\r\nTransfer-Encoding: chunked\r\n\r\n"
        );
        assert_eq!(body, b"7\r\nHyoka C\r\nd\r\nhitanda Eru\r\n\r\n0\r\n\r\n");
        assert_eq!(Dechunker::decode(body)?, b"Hyoka Chitanda Eru\r\n");
        Ok(())
    }

    #[test]
    fn chunked_malformed_size() {
        let spec = ResponseSpec::Chunked {
            head: ResponseHead::ok(),
            chunks: vec![&b"akihabara"[..]],
            malformed_size: Some("-3"),
        };
        assert_eq!(
            spec.wire_bytes(&mut rng()),
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n-3\r\nakihabara"
        );
    }

    #[test]
    fn head_parses_as_http() {
        let spec = ResponseSpec::GzipWhole {
            head: ResponseHead::ok().header("Server", "test"),
            body: b"",
        };
        let bytes = spec.wire_bytes(&mut rng());

        let mut headers = [httparse::EMPTY_HEADER; 8];
        let mut res = httparse::Response::new(&mut headers);
        let status = res.parse(&bytes).unwrap();

        assert!(status.is_complete());
        assert_eq!(res.code, Some(200));
        assert_eq!(res.headers[1].name, "Content-Encoding");
        assert_eq!(res.headers[1].value, b"gzip");
    }

    fn gzip(data: &[u8]) -> &'static [u8] {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        Box::leak(enc.finish().unwrap().into_boxed_slice())
    }

    #[test]
    fn gzip_chunked_boundaries_do_not_matter() {
        let mut r = fastrand::Rng::with_seed(99);
        let plain: Vec<u8> = (0..4000).map(|_| r.alphanumeric() as u8).collect();
        let body = gzip(&plain);

        let spec = ResponseSpec::GzipChunked {
            head: ResponseHead::ok(),
            body,
            chunk_sizes: 16..=128,
        };

        let mut seen_layouts = vec![];

        for seed in 0..20 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let steps = spec.transmission(&mut rng);

            // Head, at least one data chunk, terminator.
            assert!(steps.len() >= 3);
            assert_eq!(steps.last(), Some(&Step::Send(b"0\r\n\r\n".to_vec())));
            seen_layouts.push(steps.len());

            let bytes = spec.wire_bytes(&mut fastrand::Rng::with_seed(seed));
            let (_, chunked) = split_head(&bytes);
            let compressed = Dechunker::decode(chunked).unwrap();
            assert_eq!(compressed, body);

            let mut decoded = vec![];
            GzDecoder::new(&compressed[..])
                .read_to_end(&mut decoded)
                .unwrap();
            assert_eq!(decoded, plain);
        }

        // Different seeds should not all give the same layout.
        seen_layouts.dedup();
        assert!(seen_layouts.len() > 1);
    }

    #[test]
    fn gzip_chunked_headers() {
        let spec = ResponseSpec::GzipChunked {
            head: ResponseHead::ok().header("Connection", "Close"),
            body: b"",
            chunk_sizes: 16..=128,
        };
        assert_eq!(
            spec.wire_bytes(&mut rng()),
            &b"HTTP/1.1 200 OK\r\nConnection: Close\r\nTransfer-Encoding: chunked\r\n\
               Content-Encoding: gzip\r\n\r\n0\r\n\r\n"[..]
        );
    }
}
