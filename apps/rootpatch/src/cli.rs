//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rootpatch - root volume patcher for legacy Mac hardware
#[derive(Parser)]
#[command(name = "rootpatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Apply or revert on-disk driver patches for unsupported Macs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output events and results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host manifest JSON: OS version plus hardware profile, produced by the
    /// hardware prober
    #[arg(long, global = true, value_name = "PATH", env = "ROOTPATCH_HARDWARE")]
    pub hardware: Option<PathBuf>,

    /// Root of the already-materialized patch payload tree
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "ROOTPATCH_PAYLOADS",
        default_value = "/usr/local/share/rootpatch/payloads"
    )]
    pub payloads: PathBuf,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve, back up and apply the root patches for this machine
    Patch,

    /// Revert root patches: sealed-snapshot revert where available, backup
    /// archive restore otherwise
    Unpatch,

    /// Report the patch decision, security posture and volume seal state
    Status,
}
