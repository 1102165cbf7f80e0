//! pews: CLI for the earthquake early-warning feed.
//!
//! Supports:
//! - Polling the live feed, one JSON line per cycle
//! - Replaying a historical incident on a virtual clock
//! - Decoding saved `.s`/`.b` resources from disk

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::{error, info};

use pews_client::{logging, poll_loop, ClientError, Cycle, FeedClient, HttpFetcher, PollOptions};
use pews_core::clock::{parse_time_key, ReplayRequest, TimeKeySource};
use pews_core::config::{self, Config};
use pews_core::{decode_station_data, decode_station_list, HeaderLayout, Station};

#[derive(Parser)]
#[command(name = "pews", version, about = "Earthquake early-warning feed decoder")]
struct Cli {
    /// Config file (defaults to ~/.pews/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the live feed and print one JSON line per cycle
    Watch {
        /// Feed base URL
        #[arg(long, env = "PEWS_BASE_URL")]
        base_url: Option<String>,

        /// Milliseconds between polls
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,

        /// Poll a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Replay a historical incident, then exit when it ends
    Replay {
        /// Incident id (e.g. 2021007178)
        #[arg(long)]
        incident_id: Option<u64>,

        /// Virtual start time, YYYYMMDDHHMMSS UTC
        #[arg(long)]
        start: Option<String>,

        /// Replay length in seconds
        #[arg(long)]
        duration_secs: Option<i64>,

        /// Feed base URL
        #[arg(long, env = "PEWS_BASE_URL")]
        base_url: Option<String>,
    },

    /// Decode a saved station list (.s) file
    Stations {
        file: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Decode a saved status message (.b) file
    Decode {
        file: PathBuf,

        /// Number of stations in the matching station list
        #[arg(long)]
        stations: usize,

        /// The file came from the replay feed (short header)
        #[arg(long)]
        replay: bool,
    },

    /// Print the current live time key
    Key,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!(error = %e, "pews failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let (cfg, config_path) = match cli.config {
        Some(path) => (config::load_config_from(&path)?, path),
        None => (config::load_config()?, config::config_file()),
    };

    match cli.command {
        Commands::Watch {
            base_url,
            interval_ms,
            once,
        } => cmd_watch(&cfg, base_url, interval_ms, once).await,
        Commands::Replay {
            incident_id,
            start,
            duration_secs,
            base_url,
        } => cmd_replay(&cfg, incident_id, start, duration_secs, base_url).await,
        Commands::Stations { file, json } => cmd_stations(file, json),
        Commands::Decode {
            file,
            stations,
            replay,
        } => cmd_decode(file, stations, replay),
        Commands::Key => {
            println!("{}", TimeKeySource::system().current_key());
            Ok(())
        }
        Commands::Config { action } => cmd_config(&cfg, &config_path, action),
    }
}

fn http_client(
    cfg: &Config,
    base_url: Option<String>,
) -> Result<FeedClient<HttpFetcher>, ClientError> {
    let base_url = base_url.unwrap_or_else(|| cfg.feed.base_url.clone());
    let fetcher = HttpFetcher::new(&base_url, Duration::from_secs(cfg.feed.timeout_secs))?;
    info!(%base_url, "using feed");
    Ok(FeedClient::system(fetcher))
}

/// Print a cycle as one JSON line.
fn emit(cycle: &Cycle) -> std::io::Result<()> {
    write_cycle(&mut std::io::stdout().lock(), cycle)
}

fn write_cycle(out: &mut impl Write, cycle: &Cycle) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, cycle)?;
    writeln!(out)?;
    out.flush()
}

async fn run_until_interrupted(client: &mut FeedClient<HttpFetcher>, opts: PollOptions) {
    tokio::select! {
        cycles = poll_loop(client, &opts, emit) => info!(cycles, "polling stopped"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
}

async fn cmd_watch(
    cfg: &Config,
    base_url: Option<String>,
    interval_ms: Option<u64>,
    once: bool,
) -> Result<(), ClientError> {
    let mut client = http_client(cfg, base_url)?;

    if once {
        let cycle = client.poll_once().await?;
        emit(&cycle)?;
        return Ok(());
    }

    let opts = PollOptions {
        interval: Duration::from_millis(interval_ms.unwrap_or(cfg.feed.poll_interval_ms)),
        ..PollOptions::default()
    };
    run_until_interrupted(&mut client, opts).await;
    Ok(())
}

async fn cmd_replay(
    cfg: &Config,
    incident_id: Option<u64>,
    start: Option<String>,
    duration_secs: Option<i64>,
    base_url: Option<String>,
) -> Result<(), ClientError> {
    let request = replay_request(cfg, incident_id, start, duration_secs)?;
    let mut client = http_client(cfg, base_url)?;
    client.begin_replay(request);

    let opts = PollOptions {
        interval: Duration::from_millis(cfg.feed.poll_interval_ms),
        until_replay_ends: true,
        ..PollOptions::default()
    };
    run_until_interrupted(&mut client, opts).await;
    Ok(())
}

/// Combine CLI arguments with the config file's replay section.
fn replay_request(
    cfg: &Config,
    incident_id: Option<u64>,
    start: Option<String>,
    duration_secs: Option<i64>,
) -> Result<ReplayRequest, ClientError> {
    let defaults = cfg.replay.as_ref();
    let missing = |what: &str| {
        pews_core::PewsError::Config(format!(
            "replay needs --{what} (or replay.{} in the config file)",
            what.replace('-', "_")
        ))
    };

    let incident_id = incident_id
        .or(defaults.map(|r| r.incident_id))
        .ok_or_else(|| missing("incident-id"))?;
    let start = start
        .or_else(|| defaults.map(|r| r.start.clone()))
        .ok_or_else(|| missing("start"))?;
    let duration_secs = duration_secs
        .or(defaults.map(|r| r.duration_secs))
        .ok_or_else(|| missing("duration-secs"))?;

    Ok(ReplayRequest {
        incident_id,
        virtual_start: parse_time_key(&start)?,
        duration: config::replay_duration(duration_secs)?,
    })
}

fn cmd_stations(file: PathBuf, json: bool) -> Result<(), ClientError> {
    let data = std::fs::read(&file)?;
    let stations = decode_station_list(&data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stations)?);
        return Ok(());
    }

    println!("{} stations in {}", stations.len(), file.display());
    if stations.is_empty() {
        return Ok(());
    }
    println!("{}", station_table(&stations));
    Ok(())
}

fn station_table(stations: &[Station]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Lat", "Lon", "Lat (deg)", "Lon (deg)"]);
    for (i, s) in stations.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i),
            Cell::new(s.latitude),
            Cell::new(s.longitude),
            Cell::new(format!("{:.2}", s.lat_deg())),
            Cell::new(format!("{:.2}", s.lon_deg())),
        ]);
    }
    table
}

fn cmd_decode(file: PathBuf, stations: usize, replay: bool) -> Result<(), ClientError> {
    let data = std::fs::read(&file)?;
    let msg = decode_station_data(&data, stations, HeaderLayout::for_replay(replay))?;
    println!("{}", serde_json::to_string_pretty(&msg)?);
    Ok(())
}

fn cmd_config(cfg: &Config, path: &Path, action: ConfigAction) -> Result<(), ClientError> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(pews_core::PewsError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ))
                .into());
            }
            config::save_config_to(&Config::default(), path)?;
            println!("Wrote {}", path.display());
        }
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", config::serialize_config(cfg));
        }
    }
    Ok(())
}
