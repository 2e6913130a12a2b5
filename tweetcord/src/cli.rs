use clap::Parser;
use std::path::PathBuf;

use crate::config::{DEFAULT_CONFIG_PATH, DEFAULT_PROFILE};

#[derive(Parser, Debug)]
#[command(
    name = "tweetcord",
    version,
    about = "Relay tweets from a watchlist of accounts into a Discord channel"
)]
pub struct Args {
    /// Watch configuration file
    #[arg(short, long, env = "TWEETCORD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Profile inside the configuration file
    #[arg(short, long, env = "TWEETCORD_PROFILE", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Also write daily-rotated log files into this directory
    #[arg(long, env = "TWEETCORD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
