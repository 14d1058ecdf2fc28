use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::catalog::EndpointKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Wire(#[from] brokenwire::Error),

    #[error("bind {kind:?} endpoint to {addr}: {source}")]
    Bind {
        kind: EndpointKind,
        addr: SocketAddr,
        source: io::Error,
    },

    #[error("catalog has no {0:?} endpoint")]
    MissingEndpoint(EndpointKind),

    #[error("input stream ended before full request head")]
    UnexpectedEof,
}
