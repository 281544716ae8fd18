//! Chainwatch configuration
use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

/// Chain RPC configuration options
#[derive(Debug, Clone, Parser)]
pub struct RpcOpts {
    /// WebSocket RPC URL of the execution client (ws:// or wss://)
    #[clap(id = "rpc_url", long = "rpc-url", env = "RPC_URL")]
    pub url: Url,
    /// Timeout in seconds applied to every RPC request
    #[clap(long = "rpc-timeout-secs", env = "RPC_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,
    /// Longest wait in seconds for the next new-head announcement before the watcher gives up
    #[clap(long = "new-head-timeout-secs", env = "NEW_HEAD_TIMEOUT_SECS", default_value = "120")]
    pub new_head_timeout_secs: u64,
}

impl RpcOpts {
    /// RPC request timeout as a [`Duration`]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Idle limit between new-head announcements as a [`Duration`]
    pub const fn new_head_timeout(&self) -> Duration {
        Duration::from_secs(self.new_head_timeout_secs)
    }
}

/// Database configuration options
#[derive(Debug, Clone, Parser)]
pub struct DatabaseOpts {
    /// SQLite database URL
    #[clap(
        id = "database_url",
        long = "database-url",
        env = "DATABASE_URL",
        default_value = "sqlite:chainwatch.db"
    )]
    pub url: String,
    /// Maximum number of pooled database connections
    #[clap(long = "database-max-connections", env = "DATABASE_MAX_CONNECTIONS", default_value = "5")]
    pub max_connections: u32,
}

/// Backfill configuration options
#[derive(Debug, Clone, Parser)]
pub struct BackfillOpts {
    /// Maximum number of blocks fetched concurrently during backfill (0 = unbounded)
    #[clap(long = "backfill-concurrency", env = "BACKFILL_CONCURRENCY", default_value = "16")]
    pub concurrency: usize,
    /// Answer the backfill confirmation prompt with "yes" without asking
    #[clap(long = "assume-yes", env = "BACKFILL_ASSUME_YES")]
    pub assume_yes: bool,
    /// Do not check for missed blocks on startup
    #[clap(long = "skip-backfill", env = "SKIP_BACKFILL", conflicts_with = "assume_yes")]
    pub skip: bool,
}

impl BackfillOpts {
    /// Concurrency limit, `None` when unbounded
    pub const fn concurrency_limit(&self) -> Option<usize> {
        if self.concurrency == 0 { None } else { Some(self.concurrency) }
    }
}

/// Run modes
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Register an address to watch
    Add {
        /// Address in hex form, with or without checksum
        address: String,
    },
    /// Backfill missed blocks and watch new blocks until a fatal error or shutdown
    Start,
    /// List registered addresses
    Addresses,
    /// Show the latest persisted block and how far it lags the chain head
    Status,
}

/// CLI options for chainwatch
#[derive(Debug, Clone, Parser)]
#[clap(name = "chainwatch", about = "Record transactions touching watched addresses")]
pub struct Opts {
    /// RPC endpoint configuration
    #[clap(flatten)]
    pub rpc: RpcOpts,

    /// Database configuration
    #[clap(flatten)]
    pub database: DatabaseOpts,

    /// Backfill configuration
    #[clap(flatten)]
    pub backfill: BackfillOpts,

    /// Run mode
    #[clap(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::{Command, Opts};
    use clap::Parser;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Opts::command().debug_assert()
    }

    #[test]
    fn parses_add_command() {
        let opts = Opts::try_parse_from([
            "chainwatch",
            "--rpc-url",
            "ws://127.0.0.1:8545",
            "add",
            "0x28c6c06298d514db089934071355e5743bf21d60",
        ])
        .unwrap();

        match opts.command {
            Command::Add { address } => {
                assert_eq!(address, "0x28c6c06298d514db089934071355e5743bf21d60")
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(opts.database.url, "sqlite:chainwatch.db");
        assert_eq!(opts.backfill.concurrency_limit(), Some(16));
    }

    #[test]
    fn zero_concurrency_is_unbounded() {
        let opts = Opts::try_parse_from([
            "chainwatch",
            "--rpc-url",
            "ws://127.0.0.1:8545",
            "--backfill-concurrency",
            "0",
            "start",
        ])
        .unwrap();

        assert!(matches!(opts.command, Command::Start));
        assert_eq!(opts.backfill.concurrency_limit(), None);
        assert_eq!(opts.rpc.timeout().as_secs(), 30);
    }

    #[test]
    fn rpc_and_database_urls_are_separate_arguments() {
        let opts = Opts::try_parse_from([
            "chainwatch",
            "--rpc-url",
            "wss://node.example:8546",
            "--database-url",
            "sqlite:/var/lib/chainwatch/watch.db",
            "--new-head-timeout-secs",
            "45",
            "status",
        ])
        .unwrap();

        assert_eq!(opts.rpc.url.as_str(), "wss://node.example:8546/");
        assert_eq!(opts.database.url, "sqlite:/var/lib/chainwatch/watch.db");
        assert_eq!(opts.rpc.new_head_timeout().as_secs(), 45);
        assert!(matches!(opts.command, Command::Status));
    }
}
