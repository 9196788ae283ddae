mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;

#[derive(Parser)]
#[command(name = "pollbot")]
#[command(version = "0.1.0")]
#[command(about = "Answers group chat polls from several accounts at once")]
#[command(
    help_template = "{name} - {version}\n{about}\n\n{usage-heading}\n  {usage}\n\n{all-args}{options}\n"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in every account and answer polls until interrupted
    ///
    /// Reasoning API keys are read from the config file or from
    /// POLLBOT_API_KEYS (comma-separated). The QR delivery bot token can be
    /// set with POLLBOT_BOT_TOKEN.
    ///
    /// Examples:
    ///   pollbot run
    ///   pollbot run --accounts 3
    ///   pollbot run --config ./pollbot.toml
    Run {
        /// Number of accounts to log in (overrides the config file)
        #[arg(short, long)]
        accounts: Option<usize>,

        /// Path to configuration file
        #[arg(long, default_value = "~/.config/pollbot/config.toml")]
        config: String,
    },

    /// Configure pollbot settings interactively
    Config {
        /// Start interactive configuration setup
        #[arg(long)]
        init: bool,

        /// Path to configuration file
        #[arg(long, default_value = "~/.config/pollbot/config.toml")]
        config_file: String,
    },

    /// Probe every reasoning API key and report which one would be used
    CheckKeys {
        /// Path to configuration file
        #[arg(long, default_value = "~/.config/pollbot/config.toml")]
        config: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(dispatch(cli));
    // A login prompt may still be parked in a blocking stdin read
    handlers::shutdown_runtime(runtime);
    result
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { accounts, config } => {
            handlers::handle_run(accounts, config).await?;
        }
        Commands::Config { init, config_file } => {
            if init {
                handlers::handle_config_init(config_file).await?;
            } else {
                handlers::handle_config_show(config_file)?;
            }
        }
        Commands::CheckKeys { config } => {
            handlers::handle_check_keys(config).await?;
        }
    }

    Ok(())
}
