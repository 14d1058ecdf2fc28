//! Ground truth for what a url serves.

use std::io::{self, Read};
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use flate2::read::GzDecoder;
use url::Url;

use crate::FetchError;

/// Body and status as served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Body with any gzip content encoding removed.
    pub body: Vec<u8>,
    pub status: u16,
}

/// Address family to resolve a host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => ip.is_ipv4(),
            Family::V6 => ip.is_ipv6(),
        }
    }
}

pub struct ReferenceFetcher {
    agent: ureq::Agent,
}

impl ReferenceFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();

        ReferenceFetcher {
            agent: config.new_agent(),
        }
    }

    /// GET `url`. Status codes are not errors, failing to get one is.
    pub fn fetch(&self, url: &Url) -> Result<Reference, FetchError> {
        let host = url.host_str().unwrap_or_default();

        let mut response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| classify(host, e))?;

        let status = response.status().as_u16();
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

        debug!("Reference {} {}, body size: {}", url, status, body.len());

        Ok(Reference { body, status })
    }
}

/// Remove a gzip content encoding. Other encodings pass through untouched.
pub fn decode_body(content_encoding: Option<&str>, body: Vec<u8>) -> Result<Vec<u8>, FetchError> {
    let Some(encoding) = content_encoding.map(str::trim) else {
        return Ok(body);
    };

    if !encoding.eq_ignore_ascii_case("gzip") {
        return Ok(body);
    }

    let mut out = vec![];
    GzDecoder::new(&body[..])
        .read_to_end(&mut out)
        .map_err(|source| FetchError::Decode {
            encoding: encoding.to_string(),
            source,
        })?;

    Ok(out)
}

/// Form-urlencode `query` onto `url`.
pub fn with_query(url: &Url, query: &[(String, String)]) -> Url {
    let mut url = url.clone();
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    url
}

/// Resolve `host` to its first address of `family`.
pub fn resolve(host: &str, family: Family) -> Result<IpAddr, FetchError> {
    resolve_all(host, 0)?
        .into_iter()
        .find(|ip| family.matches(ip))
        .ok_or_else(|| FetchError::Resolve {
            host: host.to_string(),
        })
}

/// Every address `host` resolves to, in resolver order.
pub fn resolve_all(host: &str, port: u16) -> Result<Vec<IpAddr>, FetchError> {
    let not_found = || FetchError::Resolve {
        host: host.to_string(),
    };

    // Literal addresses, bracketed or not.
    if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let addrs = (host, port).to_socket_addrs().map_err(|e| {
        debug!("resolve {}: {}", host, e);
        not_found()
    })?;

    let mut ips: Vec<IpAddr> = vec![];
    for a in addrs {
        if !ips.contains(&a.ip()) {
            ips.push(a.ip());
        }
    }

    if ips.is_empty() {
        return Err(not_found());
    }

    Ok(ips)
}

pub(crate) fn classify(host: &str, error: ureq::Error) -> FetchError {
    match error {
        ureq::Error::HostNotFound => FetchError::Resolve {
            host: host.to_string(),
        },
        ureq::Error::Timeout(_) => FetchError::Timeout,
        ureq::Error::Tls(e) => FetchError::Tls(e.to_string()),
        ureq::Error::Rustls(e) => FetchError::Tls(e.to_string()),
        ureq::Error::ConnectionFailed => FetchError::Connect("connection failed".into()),
        ureq::Error::Io(e) => classify_io(host, e),
        e => FetchError::Http(e.to_string()),
    }
}

fn classify_io(host: &str, e: io::Error) -> FetchError {
    // ureq and rustls both wrap their errors in io::Error at times.
    if e.get_ref().map_or(false, |s| s.is::<ureq::Error>()) {
        let inner = e.into_inner().and_then(|s| s.downcast::<ureq::Error>().ok());
        return match inner {
            Some(inner) => classify(host, *inner),
            None => FetchError::Http("wrapped error went missing".into()),
        };
    }

    if e.get_ref().map_or(false, |s| s.is::<rustls::Error>()) {
        return FetchError::Tls(e.to_string());
    }

    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FetchError::Timeout,
        io::ErrorKind::NotFound => FetchError::Resolve {
            host: host.to_string(),
        },
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => FetchError::Connect(e.to_string()),
        io::ErrorKind::InvalidData if looks_like_tls(&e) => FetchError::Tls(e.to_string()),
        _ => FetchError::Io(e),
    }
}

fn looks_like_tls(e: &io::Error) -> bool {
    let text = e.to_string().to_ascii_lowercase();
    ["certificate", "handshake", "tls", "alert"]
        .iter()
        .any(|w| text.contains(w))
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    #[test]
    fn decode_gzip() -> Result<(), FetchError> {
        let mut enc = GzEncoder::new(vec![], Compression::default());
        enc.write_all(b"Hello World!")?;
        let gz = enc.finish()?;

        assert_eq!(decode_body(Some("gzip"), gz.clone())?, b"Hello World!");
        assert_eq!(decode_body(Some(" GZIP "), gz.clone())?, b"Hello World!");
        assert_eq!(decode_body(None, gz.clone())?, gz);
        assert_eq!(decode_body(Some("br"), gz.clone())?, gz);
        Ok(())
    }

    #[test]
    fn decode_gzip_garbage() {
        let err = decode_body(Some("gzip"), b"not gzip".to_vec()).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn query_is_form_encoded() {
        let url = Url::parse("http://localhost:8033/test_url_parsing").unwrap();
        let q = [
            ("data1".to_string(), "}don'tforgeturlencode{".to_string()),
            ("data2".to_string(), "345%".to_string()),
        ];
        let url = with_query(&url, &q);
        assert_eq!(
            url.query(),
            Some("data1=%7Ddon%27tforgeturlencode%7B&data2=345%25")
        );

        let plain = Url::parse("http://localhost/").unwrap();
        assert_eq!(with_query(&plain, &[]).as_str(), "http://localhost/");
    }

    #[test]
    fn resolve_literals() -> Result<(), FetchError> {
        assert_eq!(resolve("127.0.0.1", Family::V4)?, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(
            resolve("[::1]", Family::V6)?,
            "::1".parse::<IpAddr>().unwrap()
        );
        assert!(matches!(
            resolve("127.0.0.1", Family::V6),
            Err(FetchError::Resolve { .. })
        ));
        Ok(())
    }

    #[test]
    fn tls_failures() {
        let corrupt = rustls::Error::InvalidMessage(rustls::InvalidMessage::InvalidContentType);
        let wrapped = io::Error::new(io::ErrorKind::InvalidData, corrupt);
        assert!(matches!(
            classify("localhost", ureq::Error::Io(wrapped)),
            FetchError::Tls(_)
        ));

        let alert = io::Error::new(io::ErrorKind::InvalidData, "received fatal alert: BadCertificate");
        assert!(matches!(classify_io("localhost", alert), FetchError::Tls(_)));

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(classify_io("localhost", refused), FetchError::Connect(_)));
    }

    #[test]
    fn resolve_localhost() -> Result<(), FetchError> {
        let ips = resolve_all("localhost", 80)?;
        assert!(ips.iter().all(|ip| ip.is_loopback()));
        Ok(())
    }
}
