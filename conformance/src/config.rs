use std::fmt;
use std::time::Duration;

/// Command line of the client under test, without the target url.
pub const DEFAULT_CLIENT: &str =
    "curl --verbose --silent -m 5 --compressed --max-redirs 0 -H \"Accept-Encoding: gzip\"";

pub const DEFAULT_FIXTURE_HOST: &str = "pj-test.htcnet.moe";

/// Program and fixed arguments of the client under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCommand {
    program: String,
    args: Vec<String>,
}

impl ClientCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ClientCommand {
            program: program.into(),
            args: vec![],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Split a command line on whitespace. Single or double quotes group words.
    ///
    /// Returns `None` for an empty command line or an unterminated quote.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = vec![];
        let mut word = String::new();
        let mut in_word = false;
        let mut quote = None;

        for c in line.chars() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), c) => word.push(c),
                (None, '"' | '\'') => {
                    quote = Some(c);
                    in_word = true;
                }
                (None, c) if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut word));
                        in_word = false;
                    }
                }
                (None, c) => {
                    word.push(c);
                    in_word = true;
                }
            }
        }

        if quote.is_some() {
            return None;
        }
        if in_word {
            words.push(word);
        }

        let mut words = words.into_iter();
        let program = words.next()?;

        Some(ClientCommand {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for ClientCommand {
    fn default() -> Self {
        ClientCommand {
            program: "curl".into(),
            args: [
                "--verbose",
                "--silent",
                "-m",
                "5",
                "--compressed",
                "--max-redirs",
                "0",
                "-H",
                "Accept-Encoding: gzip",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            if a.contains(char::is_whitespace) {
                write!(f, " \"{}\"", a)?;
            } else {
                write!(f, " {}", a)?;
            }
        }
        Ok(())
    }
}

/// Everything a conformance run needs to know.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub client: ClientCommand,
    /// Wait for the client on fetch scenarios.
    pub fetch_timeout: Duration,
    /// Wait for the client on name resolution scenarios.
    pub dns_timeout: Duration,
    pub reference_timeout: Duration,
    /// Host running brokenbin.
    pub fixture_host: String,
    pub ipv6: bool,
    pub https: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            client: ClientCommand::default(),
            fetch_timeout: Duration::from_secs(16),
            dns_timeout: Duration::from_secs(6),
            reference_timeout: Duration::from_secs(5),
            fixture_host: DEFAULT_FIXTURE_HOST.into(),
            ipv6: true,
            https: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_client_parses() {
        let parsed = ClientCommand::parse(DEFAULT_CLIENT).unwrap();
        assert_eq!(parsed, ClientCommand::default());
        assert_eq!(parsed.args().last().unwrap(), "Accept-Encoding: gzip");
    }

    #[test]
    fn parse_quotes() {
        let c = ClientCommand::parse("java -jar 'lab get.jar' \"\" x").unwrap();
        assert_eq!(c.program(), "java");
        assert_eq!(c.args(), ["-jar", "lab get.jar", "", "x"]);
    }

    #[test]
    fn parse_rejects() {
        assert_eq!(ClientCommand::parse("   "), None);
        assert_eq!(ClientCommand::parse("curl 'oops"), None);
    }

    #[test]
    fn display_quotes_spaces() {
        let c = ClientCommand::new("curl").arg("-H").arg("Accept-Encoding: gzip");
        assert_eq!(c.to_string(), "curl -H \"Accept-Encoding: gzip\"");
    }

    #[test]
    fn default_timeouts() {
        let c = HarnessConfig::default();
        assert_eq!(c.fetch_timeout, Duration::from_secs(16));
        assert_eq!(c.dns_timeout, Duration::from_secs(6));
        assert_eq!(c.reference_timeout, Duration::from_secs(5));
    }
}
