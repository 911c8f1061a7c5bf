// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Annex - message metadata overlay and incremental sync server.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;

use std::path::PathBuf;

use annex_config::AnnexConfig;
use clap::{Parser, Subcommand};

/// Annex - message metadata overlay and incremental sync server.
#[derive(Parser, Debug)]
#[command(name = "annex", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Validate configuration and exit.
    CheckConfig,
    /// Move user extra rows to a new shard count (server must be stopped).
    Repartition {
        /// New number of user extra shard tables.
        #[arg(long)]
        count: u32,
    },
}

fn load_config(path: Option<&PathBuf>) -> AnnexConfig {
    let loaded = match path {
        Some(path) => annex_config::load_and_validate_path(path),
        None => annex_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            annex_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) => {
            serve::init_tracing(&config.server.log_level);
            if let Err(e) = serve::run_serve(config).await {
                tracing::error!(error = %e, "annex serve failed");
                eprintln!("annex: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!(
                "annex: config OK (listen {}:{}, database {}, {} user extra shards, upstream {})",
                config.server.host,
                config.server.port,
                config.storage.database_path,
                config.storage.user_extra_table_count,
                config.upstream.api_url,
            );
        }
        Some(Commands::Repartition { count }) => {
            serve::init_tracing(&config.server.log_level);
            match annex_storage::repartition(&config.storage.database_path, count).await {
                Ok(report) => {
                    println!(
                        "annex: repartitioned {} -> {} shards ({} rows, {} moved)",
                        report.from, report.to, report.rows, report.moved
                    );
                    if report.to != config.storage.user_extra_table_count {
                        println!(
                            "annex: set storage.user_extra_table_count = {} before the next start",
                            report.to
                        );
                    }
                }
                Err(e) => {
                    eprintln!("annex: repartition failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("annex: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repartition_requires_count() {
        let cli = Cli::try_parse_from(["annex", "repartition", "--count", "8"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Repartition { count: 8 })));
        assert!(Cli::try_parse_from(["annex", "repartition"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["annex", "serve", "--config", "/tmp/annex.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/annex.toml")));
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }
}
