use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use conformance::config::{DEFAULT_CLIENT, DEFAULT_FIXTURE_HOST};
use conformance::{suite, ClientCommand, HarnessConfig, Orchestrator};

/// Run the conformance scenarios against an http client.
#[derive(Debug, Parser)]
#[command(name = "conformance", version)]
struct Args {
    /// Client command line. The url is appended as the last argument.
    #[arg(long, env = "CONFORMANCE_CLIENT", default_value = DEFAULT_CLIENT)]
    client: String,

    /// Host running brokenbin.
    #[arg(long, env = "CONFORMANCE_FIXTURE_HOST", default_value = DEFAULT_FIXTURE_HOST)]
    fixture_host: String,

    /// Skip scenarios needing ipv6.
    #[arg(long)]
    no_ipv6: bool,

    /// Skip scenarios needing https.
    #[arg(long)]
    no_https: bool,

    /// Only run the brokenbin scenarios.
    #[arg(long)]
    fixtures_only: bool,

    /// Seconds to wait for the client on fetch scenarios.
    #[arg(long, default_value_t = 16)]
    fetch_timeout: u64,

    /// Seconds to wait for the client on name resolution scenarios.
    #[arg(long, default_value_t = 6)]
    dns_timeout: u64,

    /// Seconds allowed for each reference fetch.
    #[arg(long, default_value_t = 5)]
    reference_timeout: u64,

    /// Only run scenarios whose name contains this.
    #[arg(long)]
    filter: Option<String>,

    /// List scenario names and exit.
    #[arg(long)]
    list: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let Some(client) = ClientCommand::parse(&args.client) else {
        log::error!("Unusable client command: {:?}", args.client);
        return ExitCode::from(2);
    };

    let config = HarnessConfig {
        client,
        fetch_timeout: Duration::from_secs(args.fetch_timeout),
        dns_timeout: Duration::from_secs(args.dns_timeout),
        reference_timeout: Duration::from_secs(args.reference_timeout),
        fixture_host: args.fixture_host.clone(),
        ipv6: !args.no_ipv6,
        https: !args.no_https,
    };

    let scenarios = if args.fixtures_only {
        suite::fixture_scenarios(&config.fixture_host)
    } else {
        suite::standard_suite(&config)
    };

    let scenarios = match scenarios {
        Ok(v) => v,
        Err(e) => {
            log::error!("Bad fixture host {:?}: {}", config.fixture_host, e);
            return ExitCode::from(2);
        }
    };

    let scenarios: Vec<_> = scenarios
        .into_iter()
        .filter(|s| match &args.filter {
            Some(f) => s.name().contains(f.as_str()),
            None => true,
        })
        .collect();

    if args.list {
        for s in &scenarios {
            println!("{}  {}", s.name(), s.url());
        }
        return ExitCode::SUCCESS;
    }

    let orchestrator = Orchestrator::new(&config);
    let mut failed = vec![];

    for s in &scenarios {
        match orchestrator.run(s) {
            Ok(_) => println!("ok      {}", s.name()),
            Err(e) => {
                log::warn!("{} failed: {}", s.name(), e);
                println!("FAILED  {}: {}", s.name(), e);
                failed.push(s.name());
            }
        }
    }

    println!(
        "\n{} passed, {} failed",
        scenarios.len() - failed.len(),
        failed.len()
    );

    if failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
