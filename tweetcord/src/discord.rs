//! Discord REST client: destination channel resolution and notification
//! delivery as embeds.
//!
//! Implements Discord's recommended rate limit handling:
//! - No hardcoded rate limits
//! - Retries on 429 responses respecting the Retry-After header

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tweetwatch::{ChannelResolver, DispatchError, Dispatcher, Error, Notification};

use crate::http_client::build_client;

/// Discord REST API base.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Maximum number of attempts for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Embed limits
const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_NAME_LIMIT: usize = 256;
const FIELD_VALUE_LIMIT: usize = 1024;
const AUTHOR_NAME_LIMIT: usize = 256;
const FOOTER_TEXT_LIMIT: usize = 2048;

/// Channel as returned by `GET /channels/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Bot-authenticated Discord client scoped to one home guild.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    api_base: String,
    token: String,
    home_guild: String,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, home_guild: impl Into<String>) -> crate::Result<Self> {
        Ok(Self {
            client: build_client(Some(REQUEST_TIMEOUT))?,
            api_base: DISCORD_API_BASE.to_string(),
            token: token.into(),
            home_guild: home_guild.into(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Look up a channel and check it belongs to the home guild.
    pub async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, Error> {
        let response = self
            .client
            .get(self.url(&format!("channels/{channel_id}")))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await
            .map_err(|e| Error::channel_resolution(channel_id, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::channel_resolution(channel_id, "Unknown Channel"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::channel_resolution(
                channel_id,
                format!("{status} - {body}"),
            ));
        }

        let channel: ChannelInfo = response
            .json()
            .await
            .map_err(|e| Error::channel_resolution(channel_id, e))?;

        if channel.guild_id.as_deref() != Some(self.home_guild.as_str()) {
            return Err(Error::channel_resolution(
                channel_id,
                "channel is not in the home guild",
            ));
        }

        Ok(channel)
    }

    /// Post a message payload to a channel with rate limit handling.
    async fn send_with_retry(&self, channel_id: &str, payload: &Value) -> Result<(), DispatchError> {
        let url = self.url(&format!("channels/{channel_id}/messages"));
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&url)
                .header(AUTHORIZATION, self.auth())
                .json(payload)
                .send()
                .await
                .map_err(DispatchError::transport)?;

            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(&response);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        channel = %channel_id,
                        "Discord rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(DispatchError::RateLimited { attempts });
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Discord rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            warn!(channel = %channel_id, "Discord message failed: {} - {}", status, body);
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
    }
}

/// Parse the wait duration from a 429 response.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .filter_map(|name| response.headers().get(*name))
        .filter_map(|value| value.to_str().ok()?.parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl ChannelResolver for DiscordClient {
    async fn resolve(&self, channel_id: &str) -> tweetwatch::Result<Arc<dyn Dispatcher>> {
        let channel = self.fetch_channel(channel_id).await?;
        info!(
            channel = %channel.id,
            name = channel.name.as_deref().unwrap_or("-"),
            guild = %self.home_guild,
            "Found feed channel"
        );
        Ok(Arc::new(DiscordChannel {
            client: self.clone(),
            channel_id: channel.id,
        }))
    }
}

/// A resolved text channel in the home guild.
pub struct DiscordChannel {
    client: DiscordClient,
    channel_id: String,
}

#[async_trait]
impl Dispatcher for DiscordChannel {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError> {
        let payload = build_payload(notification);
        self.client.send_with_retry(&self.channel_id, &payload).await
    }
}

/// Truncate to `limit` characters, marking the cut with an ellipsis.
fn clamp(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clamped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clamped.push('…');
    clamped
}

/// Build the embed for a notification.
pub fn build_embed(notification: &Notification) -> Value {
    let mut author = json!({
        "name": clamp(&notification.author_name, AUTHOR_NAME_LIMIT),
        "url": notification.author_url,
    });
    if let Some(icon_url) = &notification.author_icon_url {
        author["icon_url"] = json!(icon_url);
    }

    let mut embed = json!({
        "color": notification.color,
        "timestamp": notification.timestamp.to_rfc3339(),
        "author": author,
        "url": notification.permalink_url,
        "title": clamp(&notification.title, TITLE_LIMIT),
        "footer": {
            "text": clamp(&notification.footer_text, FOOTER_TEXT_LIMIT),
            "icon_url": notification.footer_icon_url,
        },
    });

    if !notification.description.is_empty() {
        embed["description"] = json!(clamp(&notification.description, DESCRIPTION_LIMIT));
    }
    if let Some(field) = &notification.attached_field {
        // Discord rejects empty field values.
        let value = if field.body.is_empty() {
            "\u{200b}".to_string()
        } else {
            clamp(&field.body, FIELD_VALUE_LIMIT)
        };
        embed["fields"] = json!([{
            "name": clamp(&field.heading, FIELD_NAME_LIMIT),
            "value": value,
            "inline": false,
        }]);
    }
    if let Some(image_url) = &notification.image_url {
        embed["image"] = json!({ "url": image_url });
    }

    embed
}

/// Build the message payload for a notification.
pub fn build_payload(notification: &Notification) -> Value {
    json!({ "embeds": [build_embed(notification)] })
}
