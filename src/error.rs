use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("request head has no method")]
    RequestMissingMethod,

    #[error("request head has no request target")]
    RequestMissingPath,

    #[error("request target is not utf-8")]
    RequestPathNotUtf8,

    #[error("request head larger than {0} bytes")]
    RequestHeadTooLarge(usize),

    #[error("http parse fail: {0}")]
    HttpParseFail(String),

    #[error("chunk length is not ascii")]
    ChunkLenNotAscii,

    #[error("chunk length cannot be read as a number")]
    ChunkLenNotANumber,

    #[error("chunk expected crlf as next character")]
    ChunkExpectedCrLf,

    #[error("chunked body ended before the terminating chunk")]
    ChunkedBodyIncomplete,
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        Error::HttpParseFail(value.to_string())
    }
}
