// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nagare binary entry point.
//!
//! Subcommands: `serve` runs the webhook gateway and delivery poller,
//! `migrate` applies pending database migrations, `config` prints the
//! effective configuration.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use nagare_config::{ConfigError, NagareConfig};
use nagare_core::NagareError;

mod serve;
mod shutdown;

/// LINE official-account marketing automation backend.
#[derive(Parser, Debug)]
#[command(name = "nagare", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the default locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook gateway and the scheduled delivery poller.
    Serve,
    /// Open the database, apply pending migrations, and exit.
    Migrate,
    /// Print the effective configuration as TOML, secrets redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            nagare_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Migrate) => run_migrate(&config).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            eprintln!("nagare: no subcommand given, try `nagare --help`");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<NagareConfig, Vec<ConfigError>> {
    match path {
        Some(path) => nagare_config::load_and_validate_path(path),
        None => nagare_config::load_and_validate(),
    }
}

/// Opening the database applies every pending migration.
async fn run_migrate(config: &NagareConfig) -> Result<(), NagareError> {
    let db = nagare_storage::Database::open(&config.storage.database_path).await?;
    db.close().await?;
    println!("database migrated: {}", config.storage.database_path);
    Ok(())
}

fn print_config(config: &NagareConfig) -> Result<(), NagareError> {
    print!("{}", render_config(config)?);
    Ok(())
}

/// Renders the effective configuration as TOML with secret values masked.
fn render_config(config: &NagareConfig) -> Result<String, NagareError> {
    let mut shown = config.clone();
    for secret in [
        &mut shown.server.bearer_token,
        &mut shown.line.channel_secret,
        &mut shown.line.channel_access_token,
        &mut shown.anthropic.api_key,
    ] {
        if secret.is_some() {
            *secret = Some("[redacted]".to_string());
        }
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| NagareError::Internal(format!("failed to render config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_env = "msvc"))]
    #[test]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};

        // Allocate something so the stats move, then confirm jemalloc
        // reports a nonzero allocated count.
        let data: Vec<u8> = vec![0u8; 1024 * 1024];
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report allocated bytes");
        drop(data);
    }

    #[test]
    fn render_config_redacts_secrets() {
        let mut config = NagareConfig::default();
        config.server.bearer_token = Some("admin-secret".to_string());
        config.line.channel_secret = Some("line-secret".to_string());
        config.line.channel_access_token = Some("line-token".to_string());
        config.anthropic.api_key = Some("sk-ant-xyz".to_string());

        let rendered = render_config(&config).unwrap();

        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("admin-secret"));
        assert!(!rendered.contains("line-secret"));
        assert!(!rendered.contains("line-token"));
        assert!(!rendered.contains("sk-ant-xyz"));
    }

    #[test]
    fn render_config_keeps_unset_secrets_absent() {
        let rendered = render_config(&NagareConfig::default()).unwrap();
        assert!(!rendered.contains("[redacted]"));
        assert!(rendered.contains("name = \"nagare\""));
    }

    #[tokio::test]
    async fn migrate_creates_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NagareConfig::default();
        config.storage.database_path = dir
            .path()
            .join("migrate-test.db")
            .to_string_lossy()
            .into_owned();

        run_migrate(&config).await.unwrap();

        assert!(dir.path().join("migrate-test.db").exists());
    }
}
