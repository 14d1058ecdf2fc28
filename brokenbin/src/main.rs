use std::net::IpAddr;
use std::process;

use brokenbin::{Catalog, EndpointKind, FixtureServer, ServerConfig};
use clap::Parser;

/// Serve canned, partly malformed, http responses.
#[derive(Debug, Parser)]
#[command(name = "brokenbin", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port of the broken response endpoint.
    #[arg(long, default_value_t = EndpointKind::Broken.default_port())]
    broken_port: u16,

    /// Port of the delayed response endpoint.
    #[arg(long, default_value_t = EndpointKind::Delayed.default_port())]
    delayed_port: u16,

    /// Port of the chunked and gzip endpoint.
    #[arg(long, default_value_t = EndpointKind::Encoding.default_port())]
    encoding_port: u16,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig::default()
        .host(args.host)
        .port(EndpointKind::Broken, args.broken_port)
        .port(EndpointKind::Delayed, args.delayed_port)
        .port(EndpointKind::Encoding, args.encoding_port);

    let server = match FixtureServer::bind(&config, Catalog::global()).and_then(|s| s.start()) {
        Ok(v) => v,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    server.join();
}
