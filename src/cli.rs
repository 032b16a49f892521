use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Telegram bot token, overriding config and environment
    #[arg(long)]
    pub bot_token: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}
