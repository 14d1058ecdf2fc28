//! Running the client under test as a child process.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::ClientCommand;
use crate::HarnessError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for output still in flight once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// What the client left behind.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` if the process was ended by a signal.
    pub exit_code: Option<i32>,
}

impl Captured {
    pub fn stderr_contains(&self, needle: &[u8]) -> bool {
        needle.is_empty() || self.stderr.windows(needle.len()).any(|w| w == needle)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessHarness {
    command: ClientCommand,
}

impl ProcessHarness {
    pub fn new(command: ClientCommand) -> Self {
        ProcessHarness { command }
    }

    pub fn command(&self) -> &ClientCommand {
        &self.command
    }

    /// Run the client against `url`, waiting at most `timeout`.
    pub fn run(&self, url: &str, timeout: Duration) -> Result<Captured, HarnessError> {
        self.run_with(url, timeout, || ()).map(|(c, _)| c)
    }

    /// Run the client against `url`, calling `probe` right after it started.
    ///
    /// The timeout counts from the spawn, time spent in `probe` included.
    /// A client still running at the timeout is killed and reaped.
    pub fn run_with<T>(
        &self,
        url: &str,
        timeout: Duration,
        probe: impl FnOnce() -> T,
    ) -> Result<(Captured, T), HarnessError> {
        let started = Instant::now();

        let mut child = Command::new(self.command.program())
            .args(self.command.args())
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                program: self.command.program().to_string(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let probed = probe();

        let status = match wait_until(&mut child, started + timeout)? {
            Some(v) => v,
            None => {
                warn!("Killed {} {} after {:?}", self.command, url, timeout);

                return Err(HarnessError::Timeout {
                    command: self.command.to_string(),
                    url: url.to_string(),
                    after: timeout,
                });
            }
        };

        let captured = Captured {
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
            exit_code: status.code(),
        };

        info!(
            "Call {} {}, return {:?}, stdout size: {}, stderr size: {}",
            self.command,
            url,
            captured.exit_code,
            captured.stdout.len(),
            captured.stderr.len()
        );

        Ok((captured, probed))
    }
}

/// The parts of a child process the harness waits on.
trait Supervised {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> io::Result<()>;
    fn wait(&mut self) -> io::Result<ExitStatus>;
}

impl Supervised for Child {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Wait for `child` to exit until `deadline`, `None` if it did not.
///
/// Unless it exited, the child is killed and reaped before returning.
fn wait_until(child: &mut impl Supervised, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    let result = poll_until(child, deadline);

    if !matches!(result, Ok(Some(_))) {
        let _ = child.kill();
        let _ = child.wait();
    }

    result
}

fn poll_until(child: &mut impl Supervised, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Read a pipe to its end on a separate thread.
fn drain(pipe: Option<impl Read + Send + 'static>) -> Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();

    let Some(mut pipe) = pipe else {
        let _ = tx.send(Ok(vec![]));
        return rx;
    };

    thread::spawn(move || {
        let mut buf = vec![];
        let result = pipe.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });

    rx
}

fn collect(rx: Receiver<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    // A grandchild can keep the pipe open after the client exited.
    match rx.recv_timeout(DRAIN_GRACE) {
        Ok(v) => v,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "output pipe still open after client exit",
        )),
    }
}

#[cfg(all(test, unix))]
mod test {
    use std::os::unix::process::ExitStatusExt;

    use super::*;

    fn sh(script: &str) -> ProcessHarness {
        ProcessHarness::new(ClientCommand::new("sh").arg("-c").arg(script))
    }

    #[test]
    fn captures_output_and_url() -> Result<(), HarnessError> {
        // sh -c puts the first extra argument in $0
        let h = sh("printf '%s' \"$0\"; echo oops >&2; exit 3");
        let c = h.run("http://localhost/x", Duration::from_secs(5))?;

        assert_eq!(c.stdout, b"http://localhost/x");
        assert_eq!(c.stderr, b"oops\n");
        assert_eq!(c.exit_code, Some(3));
        assert!(c.stderr_contains(b"oop"));
        assert!(!c.stderr_contains(b"http"));
        Ok(())
    }

    #[test]
    fn probe_runs_while_client_runs() -> Result<(), HarnessError> {
        let h = sh("sleep 0.2; echo done");
        let start = Instant::now();
        let (c, probed) = h.run_with("u", Duration::from_secs(5), || start.elapsed())?;

        assert!(probed < Duration::from_millis(200));
        assert_eq!(c.stdout, b"done\n");
        assert_eq!(c.exit_code, Some(0));
        Ok(())
    }

    #[test]
    fn timeout_kills() {
        let h = sh("exec sleep 10");
        let start = Instant::now();
        let err = h.run("u", Duration::from_millis(300)).unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(5));
        match err {
            HarnessError::Timeout { command, url, after } => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(url, "u");
                assert_eq!(after, Duration::from_millis(300));
            }
            e => panic!("unexpected {:?}", e),
        }
    }

    /// A child whose status can not be polled.
    #[derive(Default)]
    struct Unpollable {
        killed: bool,
        reaped: bool,
    }

    impl Supervised for Unpollable {
        fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
            Err(io::Error::new(io::ErrorKind::Other, "no such process"))
        }

        fn kill(&mut self) -> io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> io::Result<ExitStatus> {
            self.reaped = true;
            Ok(ExitStatus::from_raw(0))
        }
    }

    #[test]
    fn wait_error_kills_and_reaps() {
        let mut child = Unpollable::default();
        let deadline = Instant::now() + Duration::from_secs(5);

        assert!(wait_until(&mut child, deadline).is_err());
        assert!(child.killed);
        assert!(child.reaped);
    }

    #[test]
    fn exit_status_is_returned() -> io::Result<()> {
        let mut child = Command::new("true").spawn()?;
        let status = wait_until(&mut child, Instant::now() + Duration::from_secs(5))?;
        assert_eq!(status.and_then(|s| s.code()), Some(0));
        Ok(())
    }

    #[test]
    fn spawn_failure() {
        let h = ProcessHarness::new(ClientCommand::new("/no/such/client"));
        let err = h.run("u", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn captured_large_output() -> Result<(), HarnessError> {
        // More than a pipe buffer.
        let h = sh("head -c 200000 /dev/zero");
        let c = h.run("u", Duration::from_secs(5))?;
        assert_eq!(c.stdout.len(), 200000);
        Ok(())
    }
}
