//! The fixed set of canned responses, keyed by endpoint and request path.

use std::collections::HashMap;
use std::sync::OnceLock;

use brokenwire::{ResponseHead, ResponseSpec};

use crate::data::*;

/// The listening endpoints of the fixture server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// Malformed status lines, headers and framing.
    Broken,
    /// Responses delivered in two parts with a pause in between.
    Delayed,
    /// Chunked and gzip bodies.
    Encoding,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 3] = [Self::Broken, Self::Delayed, Self::Encoding];

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Broken => 8031,
            Self::Delayed => 8032,
            Self::Encoding => 8033,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Broken => "Broken Response",
            Self::Delayed => "Delayed Response",
            Self::Encoding => "Different Encoding",
        }
    }
}

/// How an endpoint reads the incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// One read, request target taken from between the first two spaces.
    Raw,
    /// Read a full request head before answering.
    HeaderAware,
}

#[derive(Debug)]
pub struct Endpoint {
    kind: EndpointKind,
    protocol: Protocol,
    routes: HashMap<&'static str, ResponseSpec>,
}

impl Endpoint {
    pub fn new(kind: EndpointKind, protocol: Protocol) -> Self {
        Endpoint {
            kind,
            protocol,
            routes: HashMap::new(),
        }
    }

    /// Register `spec` for `path`. A path can only be registered once.
    pub fn route(mut self, path: &'static str, spec: ResponseSpec) -> Self {
        let previous = self.routes.insert(path, spec);
        debug_assert!(previous.is_none(), "{} registered twice", path);
        self
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn lookup(&self, path: &str) -> Option<&ResponseSpec> {
        self.routes.get(path)
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<&'static str> {
        let mut paths: Vec<_> = self.routes.keys().copied().collect();
        paths.sort_by_key(|p| (p.len(), *p));
        paths
    }
}

#[derive(Debug)]
pub struct Catalog {
    endpoints: Vec<Endpoint>,
}

impl Catalog {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Catalog { endpoints }
    }

    /// The process wide catalog. Built on first use, never changed after.
    pub fn global() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(Catalog::standard)
    }

    /// All fixtures, with a freshly generated random body for `/test/12`.
    pub fn standard() -> Catalog {
        let random = random_body(RANDOM_BODY_LEN, &mut fastrand::Rng::new());
        Catalog::new(vec![broken(), delayed(random), encoding()])
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, kind: EndpointKind) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.kind == kind)
    }

    pub fn lookup(&self, kind: EndpointKind, path: &str) -> Option<&ResponseSpec> {
        self.endpoint(kind)?.lookup(path)
    }
}

fn after_200(rest: &[u8]) -> Vec<u8> {
    [HEAD_200, rest].concat()
}

fn broken() -> Endpoint {
    Endpoint::new(EndpointKind::Broken, Protocol::Raw)
        .route("/test/0", ResponseSpec::raw(&b"HTTP1.1 OK\r\n"[..]))
        .route("/test/1", ResponseSpec::raw(&b"HTTP/1.1 200OK\r\n"[..]))
        .route("/test/2", ResponseSpec::raw(HEAD_200))
        .route(
            "/test/3",
            ResponseSpec::raw(after_200(b"brokenHeader-)^-=-34haneda=\n")),
        )
        .route("/test/4", ResponseSpec::raw(after_200(b": it is broken")))
        .route("/test/5", ResponseSpec::raw(after_200(b"ebisu :\r\n")))
        .route(
            "/test/6",
            // Larger than u32::MAX.
            ResponseSpec::raw(after_200(
                b"Connection: Close\r\nContent-Length: 4294967299\r\n\r\n",
            )),
        )
        .route(
            "/test/7",
            ResponseSpec::raw(after_200(b"Content-Length: -2147483649\r\n\r\nshinagawa")),
        )
        .route(
            "/test/8",
            ResponseSpec::Chunked {
                head: ResponseHead::ok(),
                chunks: vec![MALFORMED_CHUNK_PAYLOAD],
                malformed_size: Some(MALFORMED_CHUNK_SIZE),
            },
        )
}

fn delayed(random: Vec<u8>) -> Endpoint {
    let mut sized_random = after_200(b"Content-Length: 128\r\n\r\n");
    sized_random.extend_from_slice(&random);

    Endpoint::new(EndpointKind::Delayed, Protocol::Raw)
        .route(
            "/test/10",
            ResponseSpec::split_delayed(after_200(b"Connection: Close\r\n\r\nHello World!"), DELAY),
        )
        .route(
            "/test/11",
            ResponseSpec::split_delayed(after_200(b"Content-Length: 10\r\n\r\nJavaScript"), DELAY),
        )
        .route("/test/12", ResponseSpec::split_delayed(sized_random, DELAY))
}

fn encoding_head() -> ResponseHead {
    ResponseHead::ok()
        .header("Server", "brokenbin")
        .header("Connection", "Close")
}

fn encoding() -> Endpoint {
    Endpoint::new(EndpointKind::Encoding, Protocol::HeaderAware)
        .route(
            "/test/20",
            ResponseSpec::Chunked {
                head: encoding_head(),
                chunks: vec![
                    &b"Hyoka C"[..],
                    &b"hitanda Eru\r\n"[..],
                    &b"Gochumon wa Usagi Desu ka Kafu Chino\r\n"[..],
                    &b"Re Zero kara Hajimeru Isekai Seikatsu Remu\r\n"[..],
                ],
                malformed_size: None,
            },
        )
        .route(
            "/test/21",
            ResponseSpec::GzipWhole {
                head: encoding_head(),
                body: GZIPPED_BODY,
            },
        )
        .route(
            "/test/22",
            ResponseSpec::GzipChunked {
                head: encoding_head(),
                body: GZIPPED_BODY,
                chunk_sizes: GZIP_CHUNK_SIZES,
            },
        )
}

#[cfg(test)]
mod test {
    use std::io::Read;

    use brokenwire::{Dechunker, Step};
    use flate2::read::GzDecoder;

    use super::*;

    fn wire(kind: EndpointKind, path: &str) -> Vec<u8> {
        Catalog::global()
            .lookup(kind, path)
            .unwrap()
            .wire_bytes(&mut fastrand::Rng::new())
    }

    fn body_of(bytes: &[u8]) -> &[u8] {
        let i = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
        &bytes[i + 4..]
    }

    #[test]
    fn every_path_is_registered() {
        let catalog = Catalog::global();

        let broken = catalog.endpoint(EndpointKind::Broken).unwrap();
        assert_eq!(
            broken.paths(),
            vec![
                "/test/0", "/test/1", "/test/2", "/test/3", "/test/4", "/test/5", "/test/6",
                "/test/7", "/test/8"
            ]
        );

        let delayed = catalog.endpoint(EndpointKind::Delayed).unwrap();
        assert_eq!(delayed.paths(), vec!["/test/10", "/test/11", "/test/12"]);

        let encoding = catalog.endpoint(EndpointKind::Encoding).unwrap();
        assert_eq!(encoding.paths(), vec!["/test/20", "/test/21", "/test/22"]);
        assert_eq!(encoding.protocol(), Protocol::HeaderAware);

        assert!(catalog.lookup(EndpointKind::Broken, "/test/10").is_none());
        assert!(catalog.lookup(EndpointKind::Encoding, "/").is_none());
    }

    #[test]
    fn global_is_built_once() {
        let a = wire(EndpointKind::Delayed, "/test/12");
        let b = wire(EndpointKind::Delayed, "/test/12");
        assert_eq!(a, b);
        assert!(std::ptr::eq(Catalog::global(), Catalog::global()));
    }

    #[test]
    fn broken_bytes() {
        assert_eq!(wire(EndpointKind::Broken, "/test/0"), b"HTTP1.1 OK\r\n");
        assert_eq!(wire(EndpointKind::Broken, "/test/2"), b"HTTP/1.1 200 OK\r\n");
        assert_eq!(
            wire(EndpointKind::Broken, "/test/6"),
            b"HTTP/1.1 200 OK\r\nConnection: Close\r\nContent-Length: 4294967299\r\n\r\n"
        );
        assert_eq!(
            wire(EndpointKind::Broken, "/test/8"),
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n-3\r\nakihabara"
        );
    }

    #[test]
    fn broken_heads_do_not_parse() {
        for path in ["/test/0", "/test/1", "/test/3", "/test/5"] {
            let bytes = wire(EndpointKind::Broken, path);
            let mut headers = [httparse::EMPTY_HEADER; 16];
            let mut res = httparse::Response::new(&mut headers);
            assert!(res.parse(&bytes).is_err(), "{} parsed", path);
        }
    }

    #[test]
    fn delayed_splits_in_two() {
        let catalog = Catalog::global();
        for path in ["/test/10", "/test/11", "/test/12"] {
            let spec = catalog.lookup(EndpointKind::Delayed, path).unwrap();
            let steps = spec.transmission(&mut fastrand::Rng::new());
            assert_eq!(steps.len(), 3);
            assert_eq!(steps[1], Step::Pause(DELAY));
        }

        let random = wire(EndpointKind::Delayed, "/test/12");
        assert_eq!(body_of(&random).len(), 128);
    }

    #[test]
    fn chunked_plain_is_concatenation() {
        let bytes = wire(EndpointKind::Encoding, "/test/20");
        let body = Dechunker::decode(body_of(&bytes)).unwrap();
        assert_eq!(
            body,
            &b"Hyoka Chitanda Eru\r\nGochumon wa Usagi Desu ka Kafu Chino\r\n\
               Re Zero kara Hajimeru Isekai Seikatsu Remu\r\n"[..]
        );
        assert!(bytes.ends_with(b"\r\n0\r\n\r\n"));
    }

    #[test]
    fn gzip_fixtures_decode_to_same_text() {
        let mut whole = String::new();
        GzDecoder::new(body_of(&wire(EndpointKind::Encoding, "/test/21")))
            .read_to_string(&mut whole)
            .unwrap();

        for _ in 0..5 {
            let bytes = wire(EndpointKind::Encoding, "/test/22");
            let compressed = Dechunker::decode(body_of(&bytes)).unwrap();

            let mut chunked = String::new();
            GzDecoder::new(&compressed[..])
                .read_to_string(&mut chunked)
                .unwrap();

            assert_eq!(chunked, whole);
        }
    }
}
