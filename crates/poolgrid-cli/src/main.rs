//! poolgrid — node-pool autoscaling provider CLI.
//!
//! Opens the state store named in `poolgrid.toml` (or on the command
//! line) and either keeps the pool registry fresh (`run`) or performs a
//! single pool operation and exits.
//!
//! # Usage
//!
//! ```text
//! poolgrid --config poolgrid.toml run
//! poolgrid --cluster prod --namespace kommander increase workers 2
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod settings;

use settings::ConfigArgs;

#[derive(Parser)]
#[command(
    name = "poolgrid",
    about = "PoolGrid — node-pool target-size provider for cluster autoscaling",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    settings: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh the pool registry periodically until Ctrl-C.
    Run,
    /// Create or replace a cluster spec from a JSON file.
    ApplyCluster {
        /// Path to the ClusterSpec JSON document.
        path: PathBuf,
    },
    /// Create or replace a machine from a JSON file.
    ApplyMachine {
        /// Path to the Machine JSON document.
        path: PathBuf,
    },
    /// List the autoscaled pools with their bounds and sizes.
    Pools,
    /// Print the desired machine count of a pool.
    TargetSize { pool: String },
    /// Print the number of machines currently in a pool.
    Size { pool: String },
    /// Request more machines for a pool.
    Increase { pool: String, delta: i32 },
    /// Retract unfulfilled scale-up requests (delta must be negative).
    Decrease {
        pool: String,
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
    /// Remove specific machines from a pool.
    Remove {
        pool: String,
        /// Stable ids (provider id, or name when the provider id is unset).
        #[arg(required = true)]
        machines: Vec<String>,
    },
    /// Show the most recent scaling audit events.
    Events {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,poolgrid=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = settings::load(&cli.settings)?;
    let store = settings::open_store(&config)?;

    match cli.command {
        Command::Run => commands::run::run(&config, store).await,
        Command::ApplyCluster { path } => commands::apply::cluster(&store, &path),
        Command::ApplyMachine { path } => commands::apply::machine(&store, &path),
        Command::Pools => commands::pools::list(&config, store),
        Command::TargetSize { pool } => commands::pools::target_size(&config, store, &pool),
        Command::Size { pool } => commands::pools::size(&config, store, &pool),
        Command::Increase { pool, delta } => {
            commands::pools::increase(&config, store, &pool, delta)
        }
        Command::Decrease { pool, delta } => {
            commands::pools::decrease(&config, store, &pool, delta)
        }
        Command::Remove { pool, machines } => {
            commands::pools::remove(&config, store, &pool, &machines)
        }
        Command::Events { limit } => commands::events::list(&store, limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_decrease_delta_parses() {
        let cli = Cli::try_parse_from(["poolgrid", "--cluster", "prod", "decrease", "workers", "-2"])
            .unwrap();
        assert!(matches!(cli.command, Command::Decrease { delta: -2, .. }));
    }

    #[test]
    fn remove_requires_machines() {
        assert!(Cli::try_parse_from(["poolgrid", "remove", "workers"]).is_err());
        let cli =
            Cli::try_parse_from(["poolgrid", "remove", "workers", "i-1", "i-2"]).unwrap();
        match cli.command {
            Command::Remove { pool, machines } => {
                assert_eq!(pool, "workers");
                assert_eq!(machines, vec!["i-1", "i-2"]);
            }
            _ => panic!("expected remove"),
        }
    }
}
