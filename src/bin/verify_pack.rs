//! verify-pack: check the hash chain of runtime audit logs.
//!
//! Usage:
//!   verify-pack audit_pack.zip
//!   verify-pack --events audit/audit_0001.jsonl
//!
//! Prints the verification as JSON. Exit status: 0 when the chain holds,
//! 1 when it is broken, 2 when the input cannot be read or is not a zip.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use runtime_client::audit;
use runtime_client::ClientError;

#[derive(Parser)]
#[command(
    name = "verify-pack",
    about = "Verify the hash chain of a runtime audit pack or events JSONL file."
)]
struct Cli {
    /// Path to the audit pack zip.
    #[arg(
        value_name = "PACK",
        required_unless_present = "events",
        conflicts_with = "events"
    )]
    pack: Option<PathBuf>,

    /// Verify a single events JSONL file instead of a pack.
    #[arg(long, value_name = "FILE")]
    events: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match (cli.events, cli.pack) {
        (Some(path), _) => run(&path, audit::verify_events_file, |v: &audit::Verification| v.ok),
        (None, Some(path)) => run(&path, audit::verify_pack, |v: &audit::PackVerification| v.ok),
        (None, None) => ExitCode::from(2),
    }
}

fn run<T, F, P>(path: &Path, verify: F, passed: P) -> ExitCode
where
    T: Serialize,
    F: FnOnce(&Path) -> Result<T, ClientError>,
    P: FnOnce(&T) -> bool,
{
    let verification = match verify(path) {
        Ok(verification) => verification,
        Err(ClientError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("File not found: {}", path.display());
            return ExitCode::from(2);
        }
        Err(ClientError::Archive(err)) => {
            eprintln!("Not a zip file: {} ({err})", path.display());
            return ExitCode::from(2);
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "could not read audit input");
            return ExitCode::from(2);
        }
    };

    match serde_json::to_string_pretty(&verification) {
        Ok(report) => println!("{report}"),
        Err(err) => {
            tracing::error!(error = %err, "could not encode report");
            return ExitCode::from(2);
        }
    }

    if passed(&verification) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
