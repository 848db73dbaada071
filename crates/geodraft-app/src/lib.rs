//! Headless runner for GeoDraft sessions.
//!
//! Reads a JSON session script, replays it against an in-memory map and
//! prints the committed shapes as JSON.

mod runner;

pub use runner::{HandleDrag, MarkerSpec, Runner, Script, Step};

use geodraft_core::{ConfigError, EngineConfig, RecordError, records_to_json};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const USAGE: &str = "usage: geodraft <script.json> [--config <path>]";

/// Runner errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Usage(String),
    #[error("No vertex {vertex} on shape {shape}")]
    UnknownHandle { shape: usize, vertex: usize },
}

struct Args {
    script: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, AppError> {
    let mut script = None;
    let mut config = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Usage(format!("--config needs a path\n{USAGE}")))?;
                config = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => {
                return Err(AppError::Usage(format!("unknown option {flag}\n{USAGE}")));
            }
            path if script.is_none() => script = Some(PathBuf::from(path)),
            extra => return Err(AppError::Usage(format!("unexpected argument {extra}\n{USAGE}"))),
        }
    }
    let script = script.ok_or_else(|| AppError::Usage(USAGE.to_string()))?;
    Ok(Args { script, config })
}

/// Config precedence: `--config`, then the script's own, then the user file.
fn resolve_config(flag: Option<&Path>, script: &Script) -> Result<EngineConfig, AppError> {
    if let Some(path) = flag {
        return Ok(EngineConfig::load(path)?);
    }
    if let Some(config) = &script.config {
        return Ok(config.clone());
    }
    Ok(EngineConfig::load_or_default()?)
}

/// Run the command line (without the program name) and return the output JSON.
pub fn run(args: &[String]) -> Result<String, AppError> {
    let args = parse_args(args)?;
    let script = Script::load(&args.script)?;
    let config = resolve_config(args.config.as_deref(), &script)?;
    log::info!(
        "Replaying {} steps from {}",
        script.steps.len(),
        args.script.display()
    );
    let mut runner = Runner::new(config);
    let records = runner.run(&script)?;
    Ok(records_to_json(&records)?)
}
