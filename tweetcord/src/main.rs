use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tweetwatch::RelayService;

use tweetcord::cli::Args;
use tweetcord::config::{Credentials, FileConfigSource};
use tweetcord::discord::DiscordClient;
use tweetcord::logging;
use tweetcord::twitter::TwitterTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before flags so `.env` can supply them.
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let _log_guard = logging::init_logging(args.log_dir.as_deref(), args.verbose)?;

    if let Err(e) = run(args).await {
        error!("Application error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        profile = %args.profile,
        "Starting tweetcord"
    );

    let credentials = Credentials::from_env()?;
    let transport = TwitterTransport::new(credentials.twitter.clone())?;
    let discord = DiscordClient::new(&credentials.discord_token, &credentials.home_guild)?;

    let service = RelayService::new(
        Arc::new(FileConfigSource::new(&args.config, &args.profile)),
        Arc::new(discord),
        Arc::new(transport),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));

    let stats = service.run(cancel).await.context("Relay stopped")?;
    info!(
        received = stats.received,
        dispatched = stats.dispatched,
        failed = stats.failed,
        "Shut down"
    );
    Ok(())
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl-C, shutting down");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
}
