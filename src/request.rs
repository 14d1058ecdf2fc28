use core::str;

use httparse::{Status, EMPTY_HEADER};

use crate::util::find_space;
use crate::Error;

const MAX_HEADERS: usize = 64;

/// The parts of an incoming request a fixture cares about.
///
/// Fixtures are keyed by request target only, the method is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    method: String,
    path: String,
}

impl RequestHead {
    /// Extract method and request target from the start of `input`.
    ///
    /// The method is everything before the first space and the target is
    /// everything up to the second space. Nothing else in the input is
    /// looked at, so this accepts heads that are otherwise garbage.
    ///
    /// ```
    /// use brokenwire::RequestHead;
    ///
    /// let head = RequestHead::from_request_line(b"GET /test/6 HTTP/1.1\r\n").unwrap();
    /// assert_eq!(head.path(), "/test/6");
    ///
    /// assert!(RequestHead::from_request_line(b"GET /test/6").is_err());
    /// ```
    pub fn from_request_line(input: &[u8]) -> Result<RequestHead, Error> {
        let method_end = find_space(input).ok_or(Error::RequestMissingMethod)?;
        let rest = &input[method_end + 1..];

        let path_end = find_space(rest).ok_or(Error::RequestMissingPath)?;
        let path = str::from_utf8(&rest[..path_end]).map_err(|_| Error::RequestPathNotUtf8)?;

        Ok(RequestHead {
            method: String::from_utf8_lossy(&input[..method_end]).into_owned(),
            path: path.to_string(),
        })
    }

    /// Parse a complete request head, request line and headers.
    ///
    /// Returns `Ok(None)` if more input is needed, otherwise the head and the
    /// number of input bytes it used.
    pub fn try_parse(input: &[u8]) -> Result<Option<(RequestHead, usize)>, Error> {
        let mut headers = [EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let used = match req.parse(input)? {
            Status::Complete(v) => v,
            Status::Partial => return Ok(None),
        };

        let method = req.method.ok_or(Error::RequestMissingMethod)?;
        let path = req.path.ok_or(Error::RequestMissingPath)?;

        trace!("parsed request head with {} headers", req.headers.len());

        let head = RequestHead {
            method: method.to_string(),
            path: path.to_string(),
        };

        Ok(Some((head, used)))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
