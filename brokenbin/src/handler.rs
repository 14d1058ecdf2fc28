use std::io;
use std::net::{Shutdown, TcpStream};
use std::thread;

use brokenwire::{RequestHead, Step};

use crate::buffer::InputBuffer;
use crate::catalog::{Endpoint, Protocol};
use crate::Error;

/// How much a raw endpoint reads before looking for the request target.
const REQUEST_WINDOW: usize = 1024;

/// Upper bound for a full request head on header aware endpoints.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

pub const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nConnection: Close\r\n\r\n";
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\nConnection: Close\r\n\r\n";

/// What was sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Fixture,
    NotFound,
    BadRequest,
    /// Reading the request failed, nothing was sent.
    Nothing,
}

/// Outcome of serving one connection.
#[derive(Debug)]
pub struct Served {
    /// Request target, if one could be read.
    pub path: Option<String>,
    pub answer: Answer,
    /// Set when reading or writing failed part way.
    pub error: Option<Error>,
}

/// Serve one request read from `i` with the answer written to `o`.
///
/// Never fails, a broken peer is part of what the fixtures test.
/// Failures are recorded in [`Served::error`].
pub fn serve_single(
    i: impl io::Read,
    mut o: impl io::Write,
    endpoint: &Endpoint,
    rng: &mut fastrand::Rng,
) -> Served {
    let head = match endpoint.protocol() {
        Protocol::Raw => read_request_line(i),
        Protocol::HeaderAware => read_request_head(i),
    };

    let head = match head {
        Ok(v) => v,
        Err(e @ Error::Io(_)) => {
            return Served {
                path: None,
                answer: Answer::Nothing,
                error: Some(e),
            }
        }
        Err(e) => {
            debug!("{}: unusable request head: {}", endpoint.name(), e);

            // Raw endpoints can't tell a malformed head from an unknown path.
            let (answer, bytes) = match endpoint.protocol() {
                Protocol::Raw => (Answer::NotFound, NOT_FOUND),
                Protocol::HeaderAware => (Answer::BadRequest, BAD_REQUEST),
            };

            return Served {
                path: None,
                answer,
                error: send(&mut o, bytes).err(),
            };
        }
    };

    let path = head.path().to_string();

    let Some(spec) = endpoint.lookup(&path) else {
        return Served {
            path: Some(path),
            answer: Answer::NotFound,
            error: send(&mut o, NOT_FOUND).err(),
        };
    };

    let error = transmit(&mut o, spec.transmission(rng)).err();

    Served {
        path: Some(path),
        answer: Answer::Fixture,
        error,
    }
}

/// Serve and close one accepted connection.
pub fn handle_connection(stream: TcpStream, endpoint: &Endpoint) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());

    if let Err(e) = stream.set_nodelay(true) {
        debug!("{}: set_nodelay: {}", endpoint.name(), e);
    }

    let mut rng = fastrand::Rng::new();
    let served = serve_single(&stream, &stream, endpoint, &mut rng);

    info!(
        "{} {} {}",
        endpoint.name(),
        peer,
        served.path.as_deref().unwrap_or("")
    );

    if let Some(e) = served.error {
        // Peers hanging up early is expected.
        debug!("{} {}: aborted: {}", endpoint.name(), peer, e);
    }

    // The stream is dropped, and thereby closed, right after this.
    let _ = stream.shutdown(Shutdown::Both);
}

fn read_request_line(i: impl io::Read) -> Result<RequestHead, Error> {
    let mut input = InputBuffer::new(i, REQUEST_WINDOW);
    input.fill_more()?;

    Ok(RequestHead::from_request_line(&input)?)
}

fn read_request_head(i: impl io::Read) -> Result<RequestHead, Error> {
    let mut input = InputBuffer::new(i, MAX_REQUEST_HEAD);

    loop {
        input.fill_more()?;

        if let Some((head, _)) = RequestHead::try_parse(&input)? {
            return Ok(head);
        }

        if input.is_full() {
            return Err(brokenwire::Error::RequestHeadTooLarge(MAX_REQUEST_HEAD).into());
        }

        if input.is_ended() {
            return Err(Error::UnexpectedEof);
        }
    }
}

fn send(o: &mut impl io::Write, bytes: &[u8]) -> Result<(), Error> {
    o.write_all(bytes)?;
    o.flush()?;
    Ok(())
}

fn transmit(o: &mut impl io::Write, steps: Vec<Step>) -> Result<(), Error> {
    for step in steps {
        match step {
            Step::Send(bytes) => send(o, &bytes)?,
            Step::Pause(d) => thread::sleep(d),
        }
    }
    Ok(())
}
