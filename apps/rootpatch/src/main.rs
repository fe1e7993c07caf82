//! rootpatch - root volume patcher for legacy Mac hardware
//!
//! The CLI wires a hardware manifest, the payload tree and the policy config
//! into the ops orchestrator and renders its event stream. All decisions
//! live in the crates; this binary only parses, drives and prints.

mod cli;
mod error;
mod events;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use rootpatch_config::{Config, LoggingConfig};
use rootpatch_events::EventReceiver;
use rootpatch_ops::{OrchestratorBuilder, PatchOutcome, StatusReport, UnpatchOutcome};
use rootpatch_platform::{HostToolRunner, ToolRunner};
use rootpatch_types::{HardwareProfile, OsVersion, PayloadLayout};
use serde::Deserialize;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::select;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Debug log files land here in JSON mode.
const LOG_DIR: &str = "/var/log/rootpatch";

/// What the external hardware prober hands us: the booted OS version and the
/// immutable hardware profile, as one JSON document.
#[derive(Debug, Deserialize)]
struct HostManifest {
    os: OsVersion,
    profile: HardwareProfile,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    let config = match Config::load(cli.global.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    init_tracing(json_mode, cli.global.debug, &config.logging);

    match run(cli, config).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("application error: {e}");
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<i32, CliError> {
    let manifest = load_manifest(cli.global.hardware.as_deref())?;

    let (event_sender, event_receiver) = rootpatch_events::channel();
    let runner: Arc<dyn ToolRunner> = Arc::new(HostToolRunner::new());
    let orchestrator = OrchestratorBuilder::new()
        .config(config)
        .os(manifest.os)
        .profile(manifest.profile)
        .payloads(PayloadLayout::new(cli.global.payloads.clone()))
        .runner(runner)
        .event_sender(event_sender)
        .build()?;

    let mut handler = EventHandler::new(cli.global.json, cli.global.debug);
    match cli.command {
        Commands::Patch => {
            let outcome = drive(orchestrator.patch(), event_receiver, &mut handler).await?;
            render_patch_outcome(&outcome, cli.global.json);
            Ok(outcome.exit_code())
        }
        Commands::Unpatch => {
            let outcome = drive(orchestrator.unpatch(), event_receiver, &mut handler).await?;
            render_unpatch_outcome(&outcome, cli.global.json);
            Ok(outcome.exit_code())
        }
        Commands::Status => {
            let report = drive(orchestrator.status(), event_receiver, &mut handler).await?;
            render_status(&report, cli.global.json);
            Ok(0)
        }
    }
}

/// Run the workflow while rendering its event stream as it arrives.
async fn drive<T>(
    future: impl std::future::Future<Output = Result<T, rootpatch_errors::Error>>,
    mut receiver: EventReceiver,
    handler: &mut EventHandler,
) -> Result<T, rootpatch_errors::Error> {
    tokio::pin!(future);
    loop {
        select! {
            result = &mut future => {
                // Drain whatever the workflow emitted right before finishing.
                while let Ok(event) = receiver.try_recv() {
                    handler.handle(&event);
                }
                return result;
            }
            event = receiver.recv() => {
                if let Some(event) = event {
                    handler.handle(&event);
                }
            }
        }
    }
}

fn load_manifest(path: Option<&Path>) -> Result<HostManifest, CliError> {
    let Some(path) = path else {
        return Err(CliError::InvalidArguments(
            "--hardware is required; point it at the hardware prober's JSON manifest".to_string(),
        ));
    };
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| CliError::Manifest(format!("{}: {e}", path.display())))
}

fn render_patch_outcome(outcome: &PatchOutcome, json: bool) {
    if json {
        if let Ok(rendered) = serde_json::to_string_pretty(outcome) {
            println!("{rendered}");
        }
        return;
    }
    match outcome {
        PatchOutcome::NoPatchNeeded => println!("Nothing to patch on this machine."),
        PatchOutcome::Blocked { blockers } => {
            println!("Patching refused:");
            for blocker in blockers {
                println!("  - {}", blocker.description());
                println!("    fix: {}", blocker.remediation());
            }
        }
        PatchOutcome::MountFailed { detail } => {
            println!("Could not mount the root volume: {detail}");
            println!("Reboot and try again.");
        }
        PatchOutcome::PatchFailed {
            operation,
            diagnostic,
        } => {
            println!("Patching failed at: {operation}");
            println!("{diagnostic}");
            println!("The volume is partially patched; run 'rootpatch unpatch' to recover.");
        }
        PatchOutcome::SealFailed { diagnostic } => {
            println!("Patches applied but the volume could not be resealed:");
            println!("{diagnostic}");
        }
        PatchOutcome::Success => println!("Patches applied. Reboot to activate them."),
    }
}

fn render_unpatch_outcome(outcome: &UnpatchOutcome, json: bool) {
    if json {
        if let Ok(rendered) = serde_json::to_string_pretty(outcome) {
            println!("{rendered}");
        }
        return;
    }
    match outcome {
        UnpatchOutcome::Blocked { blockers } => {
            println!("Unpatching refused:");
            for blocker in blockers {
                println!("  - {}", blocker.description());
                println!("    fix: {}", blocker.remediation());
            }
        }
        UnpatchOutcome::MountFailed { detail } => {
            println!("Could not mount the root volume: {detail}");
            println!("Reboot and try again.");
        }
        UnpatchOutcome::RevertedNatively => {
            println!("Reverted to the last sealed snapshot. Reboot to finish.");
        }
        UnpatchOutcome::RevertedManually { reverts } => {
            println!("Restored from backup archives:");
            for revert in reverts {
                println!("  - {}: {:?}", revert.directory, revert.status);
            }
            println!("Reboot to finish.");
        }
        UnpatchOutcome::RevertUnavailable => {
            println!("No sealed snapshot and no backup archives; cannot revert.");
            println!("Reinstall macOS to restore the original system volume.");
        }
        UnpatchOutcome::SealFailed { diagnostic } => {
            println!("Restore finished but the volume could not be resealed:");
            println!("{diagnostic}");
        }
    }
}

fn render_status(report: &StatusReport, json: bool) {
    if json {
        if let Ok(rendered) = serde_json::to_string_pretty(report) {
            println!("{rendered}");
        }
        return;
    }
    let summary = report.decision.summary();
    if summary.is_empty() {
        println!("Patch set: none needed");
    } else {
        println!("Patch set: {}", summary.join(", "));
    }
    if report.gate.allowed() {
        println!("Security gate: would pass");
    } else {
        println!("Security gate: {} blocker(s)", report.gate.blockers.len());
        for blocker in &report.gate.blockers {
            println!("  - {}", blocker.description());
        }
    }
    match report.sealed {
        Some(true) => println!("System volume: sealed (unpatched)"),
        Some(false) => println!("System volume: seal broken (patched or modified)"),
        None => println!("System volume: patched in place on this OS"),
    }
}

fn init_tracing(json_mode: bool, debug_flag: bool, logging: &LoggingConfig) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_flag;
    let default_level = if debug_enabled {
        "debug".to_string()
    } else {
        logging.level.clone()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_mode {
        // Keep stdout clean for the JSON event stream; debug logs go to a
        // timestamped file instead.
        if debug_enabled {
            let log_dir = Path::new(LOG_DIR);
            if std::fs::create_dir_all(log_dir).is_ok() {
                let log_file = log_dir.join(format!(
                    "rootpatch-{}.log",
                    chrono::Utc::now().format("%Y%m%d-%H%M%S")
                ));
                if let Ok(file) = std::fs::File::create(&log_file) {
                    tracing_subscriber::fmt()
                        .json()
                        .with_writer(Arc::new(file))
                        .with_env_filter(filter)
                        .init();
                }
            }
        }
        return;
    }

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}
