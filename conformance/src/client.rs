//! A small http 1.1 client with a curl like trace.
//!
//! Plain http is spoken directly over a `TcpStream` so that every byte the
//! server sends is judged here. Https goes through ureq.

use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

use brokenwire::Dechunker;
use url::{Position, Url};

use crate::reference::{classify, decode_body, resolve_all};
use crate::{ClientError, FetchError};

const MAX_RESPONSE_HEAD: usize = 64 * 1024;
const MAX_HEADERS: usize = 100;
const READ_SIZE: usize = 8 * 1024;

const USER_AGENT: &str = concat!("refget/", env!("CARGO_PKG_VERSION"));

/// A complete, decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    pub body: Vec<u8>,
}

/// GET `url`, writing the exchange to `trace` as it happens.
pub fn fetch(url: &Url, timeout: Duration, trace: &mut dyn Write) -> Result<Fetched, ClientError> {
    match url.scheme() {
        "http" => fetch_plain(url, timeout, trace),
        "https" => fetch_tls(url, timeout, trace),
        s => Err(ClientError::UnsupportedScheme(s.to_string())),
    }
}

fn host_of(url: &Url) -> Result<&str, FetchError> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| FetchError::NoHost(url.to_string()))
}

fn resolve_traced(
    host: &str,
    port: u16,
    trace: &mut dyn Write,
) -> Result<Vec<IpAddr>, FetchError> {
    let ips = resolve_all(host, port)?;
    for ip in &ips {
        let _ = writeln!(trace, "* Resolved {} to {}", host, ip);
    }
    Ok(ips)
}

/// `Host` header value. The port is left out when it is the default.
fn host_header(url: &Url, host: &str) -> String {
    match url.port() {
        Some(p) => format!("{}:{}", host, p),
        None => host.to_string(),
    }
}

fn request_target(url: &Url) -> &str {
    &url[Position::BeforePath..Position::AfterQuery]
}

fn connect(
    ips: &[IpAddr],
    port: u16,
    timeout: Duration,
    trace: &mut dyn Write,
) -> Result<TcpStream, FetchError> {
    let mut last = None;

    for ip in ips {
        let addr = SocketAddr::new(*ip, port);
        let _ = writeln!(trace, "*   Trying {}...", addr);

        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(v) => {
                let _ = writeln!(trace, "* Connected to {} port {}", ip, port);
                return Ok(v);
            }
            Err(e) => {
                let _ = writeln!(trace, "* connect to {} failed: {}", addr, e);
                last = Some(e);
            }
        }
    }

    Err(FetchError::Connect(match last {
        Some(e) => e.to_string(),
        None => "no address to connect to".into(),
    }))
}

fn fetch_plain(
    url: &Url,
    timeout: Duration,
    trace: &mut dyn Write,
) -> Result<Fetched, ClientError> {
    let host = host_of(url)?;
    let port = url.port_or_known_default().unwrap_or(80);

    let ips = resolve_traced(host, port, trace)?;
    let mut stream = connect(&ips, port, timeout, trace)?;
    stream.set_read_timeout(Some(timeout)).map_err(FetchError::Io)?;
    stream.set_write_timeout(Some(timeout)).map_err(FetchError::Io)?;

    let headers = [
        ("Host", host_header(url, host)),
        ("User-Agent", USER_AGENT.to_string()),
        ("Accept", "*/*".to_string()),
        ("Accept-Encoding", "gzip".to_string()),
        ("Connection", "close".to_string()),
    ];

    let mut request = format!("GET {} HTTP/1.1\r\n", request_target(url));
    for (name, value) in &headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }
    request.push_str("\r\n");

    let _ = writeln!(trace, "> GET {} HTTP/1.1", request_target(url));
    for (name, value) in &headers {
        let _ = writeln!(trace, "> {}: {}", name, value);
    }
    let _ = writeln!(trace, ">");

    stream.write_all(request.as_bytes()).map_err(io_error)?;
    stream.flush().map_err(io_error)?;

    read_response(&mut stream, trace)
}

/// Read one response from `input`, trusting nothing about it.
pub fn read_response(
    input: &mut impl Read,
    trace: &mut dyn Write,
) -> Result<Fetched, ClientError> {
    let mut buf = vec![];
    let mut ended = false;

    let (status, framing, encoding, used) = loop {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut res = httparse::Response::new(&mut headers);

        if let httparse::Status::Complete(used) = res.parse(&buf)? {
            let status = res.code.unwrap_or_default();
            let _ = writeln!(
                trace,
                "< HTTP/1.{} {} {}",
                res.version.unwrap_or(1),
                status,
                res.reason.unwrap_or_default()
            );
            for h in res.headers.iter() {
                let _ = writeln!(trace, "< {}: {}", h.name, String::from_utf8_lossy(h.value));
            }
            let _ = writeln!(trace, "<");

            let framing = Framing::of(status, res.headers)?;
            let encoding = header(res.headers, "content-encoding").map(str::to_string);

            break (status, framing, encoding, used);
        }

        if ended {
            return Err(ClientError::IncompleteHead);
        }
        if buf.len() >= MAX_RESPONSE_HEAD {
            return Err(ClientError::HeadTooLarge(MAX_RESPONSE_HEAD));
        }

        ended = read_more(input, &mut buf)? == 0;
    };

    let rest = buf.split_off(used);

    let body = match framing {
        Framing::Empty => vec![],
        Framing::Length(n) => read_sized(input, rest, n)?,
        Framing::Chunked => read_chunked(input, rest)?,
        Framing::Close => read_to_close(input, rest)?,
    };

    let body = decode_body(encoding.as_deref(), body)?;

    let _ = writeln!(trace, "* Received {} body bytes", body.len());

    Ok(Fetched { status, body })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Empty,
    Length(u64),
    Chunked,
    Close,
}

impl Framing {
    fn of(status: u16, headers: &[httparse::Header]) -> Result<Framing, ClientError> {
        if status < 200 || status == 204 || status == 304 {
            return Ok(Framing::Empty);
        }

        let chunked = headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case("transfer-encoding"))
            .any(|h| String::from_utf8_lossy(h.value).to_ascii_lowercase().contains("chunked"));

        if chunked {
            return Ok(Framing::Chunked);
        }

        let Some(value) = header(headers, "content-length") else {
            return Ok(Framing::Close);
        };

        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|c| c.is_ascii_digit()) {
            return Err(ClientError::BadContentLength(value.to_string()));
        }

        value
            .parse()
            .map(Framing::Length)
            .map_err(|_| ClientError::BadContentLength(value.to_string()))
    }
}

fn header<'a>(headers: &[httparse::Header<'a>], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| std::str::from_utf8(h.value).ok())
}

fn io_error(e: io::Error) -> ClientError {
    ClientError::Fetch(match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FetchError::Timeout,
        _ => FetchError::Io(e),
    })
}

fn read_more(input: &mut impl Read, buf: &mut Vec<u8>) -> Result<usize, ClientError> {
    let start = buf.len();
    buf.resize(start + READ_SIZE, 0);

    let result = input.read(&mut buf[start..]);
    let n = *result.as_ref().unwrap_or(&0);
    buf.truncate(start + n);

    result.map_err(io_error)
}

fn read_sized(input: &mut impl Read, mut body: Vec<u8>, n: u64) -> Result<Vec<u8>, ClientError> {
    let have = body.len() as u64;

    if have < n {
        input
            .take(n - have)
            .read_to_end(&mut body)
            .map_err(io_error)?;
    }

    let received = body.len() as u64;
    if received < n {
        return Err(ClientError::BodyIncomplete {
            expected: n,
            received,
        });
    }

    // Whatever follows the declared length is not part of this response.
    body.truncate(n as usize);
    Ok(body)
}

fn read_chunked(input: &mut impl Read, mut pending: Vec<u8>) -> Result<Vec<u8>, ClientError> {
    let mut dechunker = Dechunker::new();
    let mut body = vec![];
    let mut out = vec![0; READ_SIZE];

    loop {
        if out.len() < pending.len() {
            out.resize(pending.len(), 0);
        }

        let (used, written) = dechunker.parse_input(&pending, &mut out)?;
        body.extend_from_slice(&out[..written]);
        pending.drain(..used);

        if dechunker.is_ended() {
            return Ok(body);
        }

        if used == 0 && read_more(input, &mut pending)? == 0 {
            return Err(brokenwire::Error::ChunkedBodyIncomplete.into());
        }
    }
}

fn read_to_close(input: &mut impl Read, mut body: Vec<u8>) -> Result<Vec<u8>, ClientError> {
    input.read_to_end(&mut body).map_err(io_error)?;
    Ok(body)
}

fn fetch_tls(url: &Url, timeout: Duration, trace: &mut dyn Write) -> Result<Fetched, ClientError> {
    let host = host_of(url)?;
    let port = url.port_or_known_default().unwrap_or(443);

    resolve_traced(host, port, trace)?;

    let _ = writeln!(trace, "> GET {} HTTP/1.1", request_target(url));
    let _ = writeln!(trace, "> Host: {}", host_header(url, host));
    let _ = writeln!(trace, "> User-Agent: {}", USER_AGENT);
    let _ = writeln!(trace, "> Accept-Encoding: gzip");
    let _ = writeln!(trace, ">");

    let mut response = tls_agent(timeout)
        .get(url.as_str())
        .header("Accept-Encoding", "gzip")
        .call()
        .map_err(|e| classify(host, e))?;

    let status = response.status();
    let _ = writeln!(
        trace,
        "< {:?} {} {}",
        response.version(),
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    for (name, value) in response.headers() {
        let _ = writeln!(
            trace,
            "< {}: {}",
            title_case(name.as_str()),
            String::from_utf8_lossy(value.as_bytes())
        );
    }
    let _ = writeln!(trace, "<");

    let encoding = response
        .headers()
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| classify(host, e))?;
    let body = decode_body(encoding.as_deref(), body)?;

    let _ = writeln!(trace, "* Received {} body bytes", body.len());

    Ok(Fetched {
        status: status.as_u16(),
        body,
    })
}

/// Redirects are not followed, a 3xx is handed back like any other status.
fn tls_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .max_redirects_will_error(false)
        .user_agent(USER_AGENT)
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

/// `content-encoding` to `Content-Encoding`.
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;

    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }

    out
}

#[cfg(test)]
mod test {
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn read(bytes: &[u8]) -> Result<Fetched, ClientError> {
        read_response(&mut Cursor::new(bytes.to_vec()), &mut io::sink())
    }

    /// Hands out one byte per read.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn sized_body() -> Result<(), ClientError> {
        let f = read(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nJavaScript")?;
        assert_eq!(f.status, 200);
        assert_eq!(f.body, b"JavaScript");
        Ok(())
    }

    #[test]
    fn close_delimited_body() -> Result<(), ClientError> {
        let f = read(b"HTTP/1.1 200 OK\r\nConnection: Close\r\n\r\nHello World!")?;
        assert_eq!(f.body, b"Hello World!");
        Ok(())
    }

    #[test]
    fn chunked_body_trickled() -> Result<(), ClientError> {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                     7\r\nHyoka C\r\nd\r\nhitanda Eru\r\n\r\n0\r\n\r\n";
        let f = read_response(&mut Trickle(wire), &mut io::sink())?;
        assert_eq!(f.body, b"Hyoka Chitanda Eru\r\n");
        Ok(())
    }

    #[test]
    fn endless_chunk_size_line() {
        let head = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
        let mut input = Cursor::new(head.to_vec()).chain(io::repeat(b'1'));

        let err = read_response(&mut input, &mut io::sink()).unwrap_err();
        assert!(
            matches!(err, ClientError::Chunked(brokenwire::Error::ChunkExpectedCrLf)),
            "{}",
            err
        );
    }

    #[test]
    fn redirect_is_returned() -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;

        let server = thread::spawn(move || -> io::Result<()> {
            let (mut stream, _) = listener.accept()?;
            let mut req = vec![];
            let mut buf = [0; 1024];
            while !req.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                req.extend_from_slice(&buf[..n]);
            }
            stream.write_all(
                b"HTTP/1.1 302 Found\r\nLocation: /elsewhere\r\n\
                  Content-Length: 5\r\nConnection: close\r\n\r\nmoved",
            )
        });

        let mut response = tls_agent(Duration::from_secs(5))
            .get(format!("http://{}/", addr))
            .call()?;
        assert_eq!(response.status().as_u16(), 302);
        assert_eq!(response.body_mut().read_to_vec()?, b"moved");

        server.join().unwrap()?;
        Ok(())
    }

    #[test]
    fn trace_has_status_and_headers() -> Result<(), ClientError> {
        let mut trace = vec![];
        read_response(
            &mut Cursor::new(b"HTTP/1.1 404 Not Found\r\nServer: x\r\n\r\n".to_vec()),
            &mut trace,
        )?;
        let trace = String::from_utf8(trace).unwrap();
        assert!(trace.contains("< HTTP/1.1 404 Not Found\n"));
        assert!(trace.contains("< Server: x\n"));
        Ok(())
    }

    #[test]
    fn broken_responses_fail() {
        let cases: &[&[u8]] = &[
            b"HTTP1.1 OK\r\n",
            b"HTTP/1.1 200OK\r\n",
            b"HTTP/1.1 200 OK\r\n",
            b"HTTP/1.1 200 OK\r\nbrokenHeader-)^-=-34haneda=\n",
            b"HTTP/1.1 200 OK\r\n: it is broken",
            b"HTTP/1.1 200 OK\r\nebisu :\r\n",
            b"HTTP/1.1 200 OK\r\nConnection: Close\r\nContent-Length: 4294967299\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nContent-Length: -2147483649\r\n\r\nshinagawa",
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n-3\r\nakihabara",
        ];

        for c in cases {
            assert!(read(c).is_err(), "{:?}", String::from_utf8_lossy(c));
        }
    }

    #[test]
    fn error_kinds() {
        assert!(matches!(
            read(b"HTTP/1.1 200 OK\r\nContent-Length: -1\r\n\r\n"),
            Err(ClientError::BadContentLength(_))
        ));
        assert!(matches!(
            read(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nab"),
            Err(ClientError::BodyIncomplete {
                expected: 5,
                received: 2
            })
        ));
        assert!(matches!(read(b"HTTP/1.1 200 OK\r\n"), Err(ClientError::IncompleteHead)));
    }

    #[test]
    fn no_body_statuses() -> Result<(), ClientError> {
        let f = read(b"HTTP/1.1 204 No Content\r\nContent-Length: 3\r\n\r\n")?;
        assert!(f.body.is_empty());
        Ok(())
    }

    #[test]
    fn title_casing() {
        assert_eq!(title_case("content-encoding"), "Content-Encoding");
        assert_eq!(title_case("x-a"), "X-A");
        assert_eq!(title_case("etag"), "Etag");
    }

    #[test]
    fn target_and_host() {
        let url = Url::parse("http://example.com:92/eams/login.action?a=1#frag").unwrap();
        assert_eq!(request_target(&url), "/eams/login.action?a=1");
        assert_eq!(host_header(&url, "example.com"), "example.com:92");

        let url = Url::parse("http://example.com").unwrap();
        assert_eq!(request_target(&url), "/");
        assert_eq!(host_header(&url, "example.com"), "example.com");
    }
}
