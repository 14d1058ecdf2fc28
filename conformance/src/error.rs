use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failure to run the client under test.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("{command} {url} did not finish within {after:?}")]
    Timeout {
        command: String,
        url: String,
        after: Duration,
    },
}

/// Failure of a reference fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("resolve {host}: no address found")]
    Resolve { host: String },

    #[error("tls: {0}")]
    Tls(String),

    #[error("timed out")]
    Timeout,

    #[error("connect: {0}")]
    Connect(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("decode {encoding} body: {source}")]
    Decode { encoding: String, source: io::Error },

    #[error("url has no host: {0}")]
    NoHost(String),

    #[error("{0}")]
    Http(String),
}

/// Failure of the built in client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("malformed response head: {0}")]
    Head(#[from] httparse::Error),

    #[error("connection closed before full response head")]
    IncompleteHead,

    #[error("response head larger than {0} bytes")]
    HeadTooLarge(usize),

    #[error("bad content-length: {0:?}")]
    BadContentLength(String),

    #[error("body ended after {received} of {expected} bytes")]
    BodyIncomplete { expected: u64, received: u64 },

    #[error("chunked body: {0}")]
    Chunked(#[from] brokenwire::Error),
}

impl ClientError {
    pub fn is_tls(&self) -> bool {
        matches!(self, ClientError::Fetch(FetchError::Tls(_)))
    }
}

/// A scenario that did not behave as expected.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{0}")]
    Harness(#[from] HarnessError),

    #[error("reference fetch failed: {0}")]
    Reference(#[from] FetchError),

    #[error("precondition: {0}")]
    Precondition(String),

    #[error("exit code {actual:?}, expected {expected}")]
    ExitCode {
        expected: &'static str,
        actual: Option<i32>,
    },

    #[error("body of {actual} bytes does not match reference of {expected} bytes")]
    BodyMismatch { expected: usize, actual: usize },

    #[error("body length {actual}, expected {expected}")]
    BodyLength { expected: usize, actual: usize },

    #[error("expected empty stdout, got {0} bytes")]
    BodyNotEmpty(usize),

    #[error("expected {0:?} in stderr")]
    MissingInTrace(String),
}
