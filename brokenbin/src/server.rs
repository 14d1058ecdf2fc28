use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};

use crate::catalog::{Catalog, Endpoint, EndpointKind};
use crate::handler::handle_connection;
use crate::Error;

/// Where the fixture server listens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: IpAddr,
    broken_port: u16,
    delayed_port: u16,
    encoding_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            broken_port: EndpointKind::Broken.default_port(),
            delayed_port: EndpointKind::Delayed.default_port(),
            encoding_port: EndpointKind::Encoding.default_port(),
        }
    }
}

impl ServerConfig {
    /// Every endpoint on an OS assigned port of `host`.
    pub fn ephemeral(host: IpAddr) -> Self {
        ServerConfig {
            host,
            broken_port: 0,
            delayed_port: 0,
            encoding_port: 0,
        }
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, kind: EndpointKind, port: u16) -> Self {
        match kind {
            EndpointKind::Broken => self.broken_port = port,
            EndpointKind::Delayed => self.delayed_port = port,
            EndpointKind::Encoding => self.encoding_port = port,
        }
        self
    }

    pub fn addr(&self, kind: EndpointKind) -> SocketAddr {
        let port = match kind {
            EndpointKind::Broken => self.broken_port,
            EndpointKind::Delayed => self.delayed_port,
            EndpointKind::Encoding => self.encoding_port,
        };
        SocketAddr::new(self.host, port)
    }
}

/// Bound, but not yet accepting, fixture endpoints.
pub struct FixtureServer {
    bound: Vec<(&'static Endpoint, TcpListener)>,
}

impl FixtureServer {
    /// Bind every endpoint in `catalog`.
    pub fn bind(config: &ServerConfig, catalog: &'static Catalog) -> Result<FixtureServer, Error> {
        let mut bound = vec![];

        for kind in EndpointKind::ALL {
            let endpoint = catalog
                .endpoint(kind)
                .ok_or(Error::MissingEndpoint(kind))?;

            let addr = config.addr(kind);
            let listener =
                TcpListener::bind(addr).map_err(|source| Error::Bind { kind, addr, source })?;

            bound.push((endpoint, listener));
        }

        Ok(FixtureServer { bound })
    }

    pub fn local_addr(&self, kind: EndpointKind) -> Option<SocketAddr> {
        self.bound
            .iter()
            .find(|(e, _)| e.kind() == kind)
            .and_then(|(_, l)| l.local_addr().ok())
    }

    /// Start one accept thread per endpoint.
    pub fn start(self) -> Result<RunningServer, Error> {
        let mut addrs = vec![];
        let mut handles = vec![];

        for (endpoint, listener) in self.bound {
            let addr = listener.local_addr()?;
            info!("{} listening on {}", endpoint.name(), addr);

            let handle = thread::Builder::new()
                .name(format!("accept-{}", addr.port()))
                .spawn(move || accept_loop(listener, endpoint))?;

            addrs.push((endpoint.kind(), addr));
            handles.push(handle);
        }

        Ok(RunningServer { addrs, handles })
    }
}

/// A server with its accept threads running.
///
/// There is no way to stop it, it lives until the process exits.
pub struct RunningServer {
    addrs: Vec<(EndpointKind, SocketAddr)>,
    handles: Vec<JoinHandle<()>>,
}

impl RunningServer {
    pub fn local_addr(&self, kind: EndpointKind) -> Option<SocketAddr> {
        self.addrs.iter().find(|(k, _)| *k == kind).map(|(_, a)| *a)
    }

    /// Block on the accept threads.
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn accept_loop(listener: TcpListener, endpoint: &'static Endpoint) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(v) => v,
            Err(e) => {
                warn!("{}: accept failed: {}", endpoint.name(), e);
                continue;
            }
        };

        let spawned = thread::Builder::new()
            .name("fixture-connection".into())
            .spawn(move || handle_connection(stream, endpoint));

        if let Err(e) = spawned {
            warn!("{}: failed to spawn handler: {}", endpoint.name(), e);
        }
    }
}
