use anyhow::Context;
use clap::Parser;
use showtransmission::config::{default_config_path, prepare_state, Overrides};
use showtransmission::{DedupLedger, Poller, RunConfig, ShowRssFeed, StateFile, TransmissionClient};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Automates downloading torrents from showRSS
#[derive(Parser, Debug)]
#[command(name = "showtransmission", version)]
struct Cli {
    /// Show debug messages
    #[arg(short, long, conflicts_with = "quiet")]
    debug: bool,

    /// Silence all but error messages
    #[arg(short, long)]
    quiet: bool,

    /// Config file location. Default: ~/.showtransmission
    #[arg(short, long = "config")]
    config_location: Option<PathBuf>,

    /// Location of RSS feed for showRSS
    #[arg(short, long)]
    rss_location: Option<String>,

    /// Location of transmission RPC URL
    #[arg(short, long)]
    transmission_rpc_url: Option<String>,

    /// Username for the transmission RPC endpoint
    #[arg(long)]
    username: Option<String>,

    /// Password for the transmission RPC endpoint
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Timeout in seconds for each network call
    #[arg(long)]
    timeout: Option<u64>,

    /// Show config that would be used then exit
    #[arg(long)]
    output_options: bool,

    /// Write new config to config path when done
    #[arg(long)]
    write_config: bool,

    /// Forget every previously submitted episode before polling
    #[arg(long)]
    forget: bool,
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            rss_location: self.rss_location.clone(),
            transmission_rpc_url: self.transmission_rpc_url.clone(),
            timeout_seconds: self.timeout,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

fn init_tracing(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_location.clone().unwrap_or_else(default_config_path);
    let overrides = cli.overrides();

    if cli.output_options {
        let mut state = StateFile::load(&config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?
            .with_overrides(&overrides);
        if cli.forget {
            state.hashes = DedupLedger::reset();
        }
        println!("{}", state.to_json(true)?);
        return Ok(());
    }

    let state = prepare_state(&config_path, &overrides, cli.write_config, cli.forget)
        .with_context(|| format!("preparing config {}", config_path.display()))?;

    let run_config = RunConfig::resolve(&state, &overrides, config_path)?;

    let feed = ShowRssFeed::new(run_config.rss_location.clone(), run_config.fetch.clone())?;
    let client = TransmissionClient::new(&run_config.transmission_rpc_url, run_config.rpc.clone())
        .with_context(|| format!("creating RPC client for {}", run_config.transmission_rpc_url))?;

    let mut poller = Poller::new(feed, client, state.hashes).with_ledger_path(run_config.ledger_path.clone());
    let stats = poller.run().await.context("poll run failed")?;

    info!(
        "Done: {} seen, {} added, {} ignored",
        stats.seen, stats.added, stats.ignored
    );
    Ok(())
}
