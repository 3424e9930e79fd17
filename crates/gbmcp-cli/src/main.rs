use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "gbmcp")]
#[command(about = "gbmcp CLI - inspect ROMs, configuration, save slots and notebooks", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/gbmcp/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a ROM and print its fingerprint
    Fingerprint {
        rom: PathBuf,
    },
    /// Show or initialize the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage persisted save slots
    Saves {
        #[command(subcommand)]
        action: SavesAction,
    },
    /// Read per-ROM notebooks
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
}

#[derive(Subcommand)]
enum SavesAction {
    /// List the slots stored for a ROM fingerprint
    List { fingerprint: String },
    /// Delete one slot
    Delete { fingerprint: String, slot: String },
}

#[derive(Subcommand)]
enum NotesAction {
    /// List notebook entries for a ROM fingerprint
    List { fingerprint: String },
    /// Print one entry
    Show { fingerprint: String, key: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = commands::utils::config_service(cli.config)?;

    match cli.command {
        Commands::Fingerprint { rom } => commands::fingerprint::run(&config, rom).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config)?,
            ConfigAction::Init { force } => commands::config::init(&config, force)?,
            ConfigAction::Path => commands::config::path(&config),
        },
        Commands::Saves { action } => match action {
            SavesAction::List { fingerprint } => commands::saves::list(&config, &fingerprint).await?,
            SavesAction::Delete { fingerprint, slot } => {
                commands::saves::delete(&config, &fingerprint, &slot).await?
            }
        },
        Commands::Notes { action } => match action {
            NotesAction::List { fingerprint } => commands::notes::list(&config, &fingerprint).await?,
            NotesAction::Show { fingerprint, key } => {
                commands::notes::show(&config, &fingerprint, &key).await?
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gbmcp",
            "saves",
            "delete",
            "0123456789abcdef",
            "checkpoint",
            "--verbose",
            "--config",
            "/tmp/gbmcp.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/gbmcp.toml")));
        assert!(matches!(
            cli.command,
            Commands::Saves {
                action: SavesAction::Delete { .. }
            }
        ));
    }
}
