use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use interaction::{ControllerConfig, GeoEntity};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay map selection scripts against in-memory collaborators")]
struct Args {
    /// Print compact JSON instead of pretty-printed output
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an event script and print the command trace and final state
    Replay {
        /// Script file (JSON)
        script: PathBuf,

        /// Controller config (JSON); defaults come from VENUE_MAP_* env vars
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overrides the configured access token
        #[arg(long)]
        access_token: Option<String>,
    },

    /// Report which entities of a JSON list would get a marker
    Check {
        /// Entity list file (JSON array)
        entities: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    match args.command {
        Command::Replay {
            script,
            config,
            access_token,
        } => {
            let mut cfg = match config {
                Some(path) => ControllerConfig::from_json_str(&read(&path)?)
                    .map_err(|e| format!("{}: {e}", path.display()))?,
                None => ControllerConfig::from_env().map_err(|e| e.to_string())?,
            };
            if access_token.is_some() {
                cfg.access_token = access_token;
            }

            let parsed = tools::parse_script(&read(&script)?)
                .map_err(|e| format!("{}: {e}", script.display()))?;
            info!(steps = parsed.steps.len(), entities = parsed.entities.len(), "replaying");
            let report = tools::replay(parsed, cfg).map_err(|e| e.to_string())?;
            print_json(&report, args.compact)
        }
        Command::Check { entities } => {
            let list: Vec<GeoEntity> = serde_json::from_str(&read(&entities)?)
                .map_err(|e| format!("{}: {e}", entities.display()))?;
            print_json(&tools::check_entities(list), args.compact)
        }
    }
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<(), String> {
    let out = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|e| format!("json: {e}"))?;
    println!("{out}");
    Ok(())
}
