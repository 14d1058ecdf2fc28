//! Named test cases and the orchestrator that runs them.

use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use crate::config::HarnessConfig;
use crate::harness::{Captured, ProcessHarness};
use crate::reference::{self, Family, Reference, ReferenceFetcher};
use crate::{FetchError, ScenarioError};

/// Expected exit status of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Zero,
    NonZero,
    /// Not checked.
    Any,
}

/// How stdout is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCheck {
    /// Byte for byte equal to the reference body.
    Exact,
    /// Same length as the reference body.
    LengthOnly,
    Empty,
}

/// Something that must show up in stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceCheck {
    Literal(String),
    /// Status code of the reference response.
    ReferenceStatus,
    /// The address the probe resolved the host to.
    ResolvedAddress,
}

/// Checked before the client runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The host must not resolve.
    Unresolvable,
    /// The reference fetch must fail in tls.
    TlsRejected,
}

/// Done on the orchestrator thread while the client runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Reference,
    Resolve(Family),
}

/// Which configured timeout applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Fetch,
    Dns,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    url: Url,
    wait: Wait,
    precondition: Option<Precondition>,
    probe: Option<Probe>,
    exit: Exit,
    body: Option<BodyCheck>,
    trace: Vec<TraceCheck>,
}

impl Scenario {
    fn new(name: impl Into<String>, url: Url) -> Self {
        Scenario {
            name: name.into(),
            url,
            wait: Wait::Fetch,
            precondition: None,
            probe: None,
            exit: Exit::Zero,
            body: None,
            trace: vec![],
        }
    }

    /// Client output must equal the reference body, and the reference status
    /// must be in the trace.
    pub fn fetch(name: impl Into<String>, url: Url) -> Self {
        Scenario {
            probe: Some(Probe::Reference),
            body: Some(BodyCheck::Exact),
            trace: vec![TraceCheck::ReferenceStatus],
            ..Scenario::new(name, url)
        }
    }

    /// Client must exit 0 without printing anything.
    pub fn broken(name: impl Into<String>, url: Url) -> Self {
        Scenario {
            body: Some(BodyCheck::Empty),
            ..Scenario::new(name, url)
        }
    }

    /// The address `host` resolves to must be in the trace.
    pub fn resolve(name: impl Into<String>, url: Url, family: Family) -> Self {
        Scenario {
            wait: Wait::Dns,
            probe: Some(Probe::Resolve(family)),
            exit: Exit::Any,
            trace: vec![TraceCheck::ResolvedAddress],
            ..Scenario::new(name, url)
        }
    }

    /// The host must not resolve and the client must still exit 0 without
    /// printing anything.
    pub fn unresolvable(name: impl Into<String>, url: Url) -> Self {
        Scenario {
            wait: Wait::Dns,
            precondition: Some(Precondition::Unresolvable),
            body: Some(BodyCheck::Empty),
            ..Scenario::new(name, url)
        }
    }

    /// The reference must reject the certificate, the client must exit
    /// nonzero without printing anything.
    pub fn invalid_certificate(name: impl Into<String>, url: Url) -> Self {
        Scenario {
            precondition: Some(Precondition::TlsRejected),
            exit: Exit::NonZero,
            body: Some(BodyCheck::Empty),
            ..Scenario::new(name, url)
        }
    }

    /// Compare lengths only, for pages that differ per request.
    pub fn length_only(mut self) -> Self {
        self.body = Some(BodyCheck::LengthOnly);
        self
    }

    /// Require `text` in stderr.
    pub fn trace(mut self, text: impl Into<String>) -> Self {
        self.trace.push(TraceCheck::Literal(text.into()));
        self
    }

    /// Append form-urlencoded query parameters.
    pub fn query(mut self, pairs: &[(String, String)]) -> Self {
        self.url = reference::with_query(&self.url, pairs);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn needs_reference(&self) -> bool {
        matches!(self.body, Some(BodyCheck::Exact | BodyCheck::LengthOnly))
            || self.trace.contains(&TraceCheck::ReferenceStatus)
    }
}

/// What a passed scenario observed.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub captured: Captured,
    pub reference: Option<Reference>,
    pub resolved: Option<IpAddr>,
}

enum Probed {
    Nothing,
    Reference(Result<Reference, FetchError>),
    Resolved(Result<IpAddr, FetchError>),
}

pub struct Orchestrator {
    harness: ProcessHarness,
    reference: ReferenceFetcher,
    fetch_timeout: Duration,
    dns_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: &HarnessConfig) -> Self {
        Orchestrator {
            harness: ProcessHarness::new(config.client.clone()),
            reference: ReferenceFetcher::new(config.reference_timeout),
            fetch_timeout: config.fetch_timeout,
            dns_timeout: config.dns_timeout,
        }
    }

    /// Run one scenario. The first expectation that fails is the error.
    pub fn run(&self, scenario: &Scenario) -> Result<ScenarioResult, ScenarioError> {
        let url = &scenario.url;

        match scenario.precondition {
            Some(Precondition::Unresolvable) => {
                let host = url.host_str().unwrap_or_default();
                if let Ok(ip) = reference::resolve(host, Family::V4) {
                    return Err(ScenarioError::Precondition(format!(
                        "{} resolves to {}",
                        host, ip
                    )));
                }
            }
            Some(Precondition::TlsRejected) => match self.reference.fetch(url) {
                Err(FetchError::Tls(e)) => debug!("{}: reference rejected: {}", scenario.name, e),
                Err(e) => {
                    return Err(ScenarioError::Precondition(format!(
                        "reference failed, but not in tls: {}",
                        e
                    )))
                }
                Ok(r) => {
                    return Err(ScenarioError::Precondition(format!(
                        "reference accepted the certificate, status {}",
                        r.status
                    )))
                }
            },
            None => {}
        }

        let timeout = match scenario.wait {
            Wait::Fetch => self.fetch_timeout,
            Wait::Dns => self.dns_timeout,
        };

        let (captured, probed) = self.harness.run_with(url.as_str(), timeout, || {
            match scenario.probe {
                Some(Probe::Reference) => Probed::Reference(self.reference.fetch(url)),
                Some(Probe::Resolve(family)) => Probed::Resolved(reference::resolve(
                    url.host_str().unwrap_or_default(),
                    family,
                )),
                None => Probed::Nothing,
            }
        })?;

        let (reference, resolved) = match probed {
            Probed::Nothing => (None, None),
            Probed::Reference(r) => (Some(r?), None),
            Probed::Resolved(r) => (None, Some(r?)),
        };

        if scenario.needs_reference() && reference.is_none() {
            // Scenario built without a reference probe.
            return Err(ScenarioError::Precondition("no reference to compare with".into()));
        }

        check_exit(scenario.exit, captured.exit_code)?;

        if let Some(check) = scenario.body {
            check_body(check, &captured.stdout, reference.as_ref())?;
        }

        for check in &scenario.trace {
            let needle = match check {
                TraceCheck::Literal(s) => s.clone(),
                TraceCheck::ReferenceStatus => match &reference {
                    Some(r) => r.status.to_string(),
                    None => continue,
                },
                TraceCheck::ResolvedAddress => match resolved {
                    Some(ip) => ip.to_string(),
                    None => continue,
                },
            };

            if !captured.stderr_contains(needle.as_bytes()) {
                return Err(ScenarioError::MissingInTrace(needle));
            }
        }

        Ok(ScenarioResult {
            captured,
            reference,
            resolved,
        })
    }
}

fn check_exit(expected: Exit, actual: Option<i32>) -> Result<(), ScenarioError> {
    let ok = match expected {
        Exit::Zero => actual == Some(0),
        // Killed by a signal counts as nonzero.
        Exit::NonZero => actual != Some(0),
        Exit::Any => true,
    };

    if ok {
        return Ok(());
    }

    Err(ScenarioError::ExitCode {
        expected: match expected {
            Exit::Zero => "0",
            _ => "nonzero",
        },
        actual,
    })
}

fn check_body(
    check: BodyCheck,
    stdout: &[u8],
    reference: Option<&Reference>,
) -> Result<(), ScenarioError> {
    match (check, reference) {
        (BodyCheck::Empty, _) => {
            if !stdout.is_empty() {
                return Err(ScenarioError::BodyNotEmpty(stdout.len()));
            }
        }
        (BodyCheck::Exact, Some(r)) => {
            if stdout != r.body.as_slice() {
                return Err(ScenarioError::BodyMismatch {
                    expected: r.body.len(),
                    actual: stdout.len(),
                });
            }
        }
        (BodyCheck::LengthOnly, Some(r)) => {
            if stdout.len() != r.body.len() {
                return Err(ScenarioError::BodyLength {
                    expected: r.body.len(),
                    actual: stdout.len(),
                });
            }
        }
        (_, None) => {
            return Err(ScenarioError::Precondition("no reference to compare with".into()))
        }
    }

    Ok(())
}
