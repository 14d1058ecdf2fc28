use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use conformance::client;
use url::Url;

/// Exit code for tls failures, same as curl's.
const EXIT_TLS: u8 = 60;

/// Fetch a url, trace the exchange to stderr and print the body to stdout.
#[derive(Debug, Parser)]
#[command(name = "refget", version)]
struct Args {
    /// Seconds to allow for connecting and for each read.
    #[arg(short = 'm', long = "max-time", default_value_t = 5)]
    max_time: u64,

    url: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut trace = io::stderr().lock();

    let url = if args.url.contains("://") {
        args.url.clone()
    } else {
        format!("http://{}", args.url)
    };

    let url = match Url::parse(&url) {
        Ok(v) => v,
        Err(e) => {
            let _ = writeln!(trace, "* bad url {:?}: {}", args.url, e);
            return ExitCode::SUCCESS;
        }
    };

    match client::fetch(&url, Duration::from_secs(args.max_time), &mut trace) {
        Ok(fetched) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(&fetched.body).and_then(|_| stdout.flush()) {
                let _ = writeln!(trace, "* write body: {}", e);
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.is_tls() => {
            let _ = writeln!(trace, "* {}", e);
            ExitCode::from(EXIT_TLS)
        }
        Err(e) => {
            let _ = writeln!(trace, "* {}", e);
            ExitCode::SUCCESS
        }
    }
}
