//! Conformance checks for a command line http client.
//!
//! The client is run as a child process with a url as its last argument.
//! Its exit code, stdout and stderr are compared to a reference fetch done
//! in process, see [`Scenario`] for the kinds of checks.
//!
//! ```no_run
//! use conformance::{suite, HarnessConfig, Orchestrator};
//!
//! let config = HarnessConfig::default();
//! let orchestrator = Orchestrator::new(&config);
//!
//! for scenario in suite::fixture_scenarios("localhost").unwrap() {
//!     if let Err(e) = orchestrator.run(&scenario) {
//!         println!("{}: {}", scenario.name(), e);
//!     }
//! }
//! ```

#[macro_use]
extern crate log;

mod error;
pub use error::{ClientError, FetchError, HarnessError, ScenarioError};

pub mod client;
pub mod config;
pub mod harness;
pub mod reference;
pub mod scenario;
pub mod suite;

pub use config::{ClientCommand, HarnessConfig};
pub use harness::{Captured, ProcessHarness};
pub use reference::{Family, Reference, ReferenceFetcher};
pub use scenario::{Orchestrator, Scenario, ScenarioResult};
