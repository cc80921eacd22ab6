use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_qa::commands::run_session;
use pdf_qa::config::{Config, resolve_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-qa")]
#[command(about = "Ask questions about a PDF using retrieval over a local vector index")]
#[command(version)]
struct Cli {
    /// Working directory holding config.toml, the upload and the index (default ~/.pdf-qa)
    #[arg(long, global = true, value_name = "PATH")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive upload, process and ask session (default)
    Session,
    /// Configure the embedding and generation providers
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir.as_deref())?;

    match cli.command.unwrap_or(Commands::Session) {
        Commands::Session => {
            let config = Config::load(&config_dir).context("Failed to load configuration")?;
            run_session(&config).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn defaults_to_session() {
        let cli = Cli::try_parse_from(["pdf-qa"]).expect("bare invocation should parse");
        assert!(cli.command.is_none());
        assert!(cli.config_dir.is_none());
    }

    #[test]
    fn session_command() {
        let cli = Cli::try_parse_from(["pdf-qa", "session"]).expect("session should parse");
        assert!(matches!(cli.command, Some(Commands::Session)));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["pdf-qa", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Some(Commands::Config { show }) = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn config_dir_is_global() {
        let cli = Cli::try_parse_from(["pdf-qa", "config", "--config-dir", "/tmp/qa"])
            .expect("global flag after subcommand should parse");
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/qa")));

        let cli = Cli::try_parse_from(["pdf-qa", "--config-dir", "/tmp/qa", "session"])
            .expect("global flag before subcommand should parse");
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/qa")));
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["pdf-qa", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["pdf-qa", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
