use clap::{Parser, Subcommand};

pub mod config;
pub mod init_config;
pub mod run;
pub mod status;
pub mod version;

#[derive(Parser)]
#[command(name = "timegate")]
#[command(author = "Timegate Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Telegram bot for time-limited private channel access", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot service
    Run {
        /// Path to config file (default: ~/.config/timegate/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Summarize channels, members and pending registrations
    Status {
        /// Path to config file (default: ~/.config/timegate/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Write a commented default config file
    InitConfig {
        /// Output path (default: ~/.config/timegate/config.toml)
        #[arg(long)]
        output: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config } => run::execute(config).await,
        Commands::Status { config } => status::execute(config).await,
        Commands::InitConfig { output, force } => init_config::execute(output, force),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
