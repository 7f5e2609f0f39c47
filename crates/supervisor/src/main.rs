// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! shepherdd - the Shepherd supervisor daemon
//!
//! Long-lived login-node process: one state machine per run, a poll-based
//! tick loop against the batch scheduler, restart/backoff/blacklist policy
//! driven entirely through the shared state directory.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("shepherdd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("shepherdd {}", env!("CARGO_PKG_VERSION"));
                println!("Shepherd supervisor daemon - keeps GPU runs alive on a Slurm cluster");
                println!();
                println!("USAGE:");
                println!("    shepherdd");
                println!();
                println!("State root: $SHEPHERD_STATE_DIR, else $XDG_STATE_HOME/shepherd,");
                println!("else ~/.local/state/shepherd. Runs are registered by writing");
                println!("runs/<run_id>/meta.json under the state root.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: shepherdd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    shepherd_supervisor::daemon::run().await?;
    Ok(())
}
