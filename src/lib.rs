//! Sans-IO building blocks for serving canned http 1.1 responses,
//! including deliberately broken ones.
//!
//! A [`ResponseSpec`] declares how one path is answered. It is turned into
//! a list of [`Step`]s, which whatever owns the socket carries out.
//!
//! ```
//! use brokenwire::{ResponseHead, ResponseSpec, Step};
//!
//! let spec = ResponseSpec::Chunked {
//!     head: ResponseHead::ok(),
//!     chunks: vec![&b"akihabara"[..]],
//!     malformed_size: Some("-3"),
//! };
//!
//! let steps = spec.transmission(&mut brokenwire::fastrand::Rng::new());
//!
//! assert_eq!(
//!     steps,
//!     vec![Step::Send(
//!         b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n-3\r\nakihabara".to_vec()
//!     )]
//! );
//! ```

#[macro_use]
extern crate log;

mod util;

mod error;
pub use error::Error;

pub mod chunk;
pub use chunk::Dechunker;

mod request;
pub use request::RequestHead;

mod response;
pub use response::{ResponseHead, ResponseSpec, Step};

// Re-export for callers building transmissions.
pub use fastrand;
