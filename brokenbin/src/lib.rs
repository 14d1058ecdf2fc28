//! Fixture server for http client conformance testing.
//!
//! Three endpoints each answer a fixed set of paths with canned bytes.
//! Most of them are broken on purpose: malformed status lines and
//! headers, impossible content lengths, bad chunk framing, responses
//! stalled half way, and gzip bodies delivered in random sized chunks.
//!
//! ```no_run
//! use brokenbin::{Catalog, FixtureServer, ServerConfig};
//!
//! let server = FixtureServer::bind(&ServerConfig::default(), Catalog::global())?;
//! server.start()?.join();
//! # Ok::<_, brokenbin::Error>(())
//! ```

#[macro_use]
extern crate log;

mod buffer;
mod data;
mod error;
mod server;

pub mod catalog;
pub mod handler;

pub use catalog::{Catalog, Endpoint, EndpointKind, Protocol};
pub use error::Error;
pub use handler::{handle_connection, serve_single, Answer, Served};
pub use server::{FixtureServer, RunningServer, ServerConfig};
