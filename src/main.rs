//! wa_contacts CLI - main entry point
//!
//! Gets the WhatsApp contact list from a WhatsApp Web session.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wa_contacts::commands::{self, HarvestArgs, HarvestOutcome};
use wa_contacts::config::{parse_debounce_secs, BRIDGE_ADDR_ENV, DEFAULT_DEBOUNCE_SECS};

#[derive(Parser, Debug)]
#[command(name = "wa_contacts")]
#[command(
    about = "Gets WhatsApp contact list from Web version",
    override_usage = "wa_contacts --save-credentials --time [seconds]"
)]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Saves credentials and uses them. Eliminate need to use QR code every time
    #[arg(short = 'c', long, default_value_t = false)]
    save_credentials: bool,

    /// Time (in seconds) of waiting and listening for new data before write the contacts
    #[arg(
        short = 't',
        long = "time",
        value_name = "SECONDS",
        default_value_t = DEFAULT_DEBOUNCE_SECS,
        value_parser = parse_time,
        allow_negative_numbers = true
    )]
    time: f64,

    /// Address of the WhatsApp Web bridge (host:port)
    #[arg(short = 'b', long, env = BRIDGE_ADDR_ENV)]
    bridge: Option<String>,

    /// Replay a recorded bridge event log instead of connecting
    #[arg(short = 'r', long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,
}

/// Never rejects: unreadable numbers fall back to the built-in window.
fn parse_time(raw: &str) -> Result<f64, String> {
    Ok(parse_debounce_secs(raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wa_contacts=info".parse()?))
        .init();

    let cli = Cli::parse();

    let outcome = commands::harvest_run(HarvestArgs {
        save_credentials: cli.save_credentials,
        debounce_secs: cli.time,
        bridge_addr: cli.bridge,
        replay: cli.replay,
    })
    .await?;

    if let HarvestOutcome::Written { path, count } = outcome {
        info!(path = %path.display(), count, "export finished");
    }

    Ok(())
}
