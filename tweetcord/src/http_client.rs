use std::{sync::OnceLock, time::Duration};

use reqwest::Client;
use tracing::debug;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tweetcord/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build an HTTP client. `request_timeout` bounds whole requests and must be
/// `None` for long-lived streaming responses.
pub fn build_client(request_timeout: Option<Duration>) -> reqwest::Result<Client> {
    install_rustls_provider();

    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT);

    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}
