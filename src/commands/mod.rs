use clap::{Parser, Subcommand};

pub mod list;

#[derive(Parser)]
#[command(name = "open-banking-archiver", about, version)]
pub struct Cli {
    /// Log at debug level regardless of --log-level
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored banks or accounts
    Ls {
        #[command(subcommand)]
        command: LsCommands,
    },
    /// Sync data from the provider into the database
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Start (or report) the authorization session for a bank
    Link { bank_name: String },
    /// Stop tracking a bank's requisition
    Unlink { bank_name: String },
    /// Report whether a bank's link is active
    Status { bank_name: String },
    /// Remove inactive and orphaned requisitions
    Prune,
}

#[derive(Subcommand)]
pub enum LsCommands {
    Banks,
    Accounts,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Sync the provider's institution list
    Banks,
    /// Sync accounts of every linked bank
    Accounts,
    /// Sync transactions of every linked bank
    Transactions {
        /// Poll interval in seconds; 0 runs a single cycle
        #[arg(long, default_value_t = 0)]
        poll_interval: u64,
    },
}
