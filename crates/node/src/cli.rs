//! Command-line surface for the `chronicle-node` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chronicle-node", about = "Chronicle calendar engine node")]
pub struct Cli {
    /// Path to the node's TOML configuration file.
    #[arg(long, default_value = "chronicle.toml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs the node: all engines, bus consumers, and HTTP surfaces.
    Run,
    /// Prints the current Calendar tip (id, type, hash) and exits.
    ShowTip,
    /// Recomputes and checks a block's hash and its link to the previous
    /// block, for spot-checking the local store.
    VerifyProof {
        /// The block id to verify.
        block_id: u64,
    },
}
