//! Application configuration: the TOML watch profile file and credentials
//! from the environment.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};
use tweetwatch::{ConfigError, ConfigSource, WatchConfigRecord};

use crate::error::{AppError, Result};
use crate::twitter::OAuthCredentials;

pub const DEFAULT_CONFIG_PATH: &str = "tweetcord.toml";
pub const DEFAULT_PROFILE: &str = "default";

pub const TWITTER_CONSUMER_KEY: &str = "TWITTER_CONSUMER_KEY";
pub const TWITTER_CONSUMER_SECRET: &str = "TWITTER_CONSUMER_SECRET";
pub const TWITTER_ACCESS_TOKEN_KEY: &str = "TWITTER_ACCESS_TOKEN_KEY";
pub const TWITTER_ACCESS_TOKEN_SECRET: &str = "TWITTER_ACCESS_TOKEN_SECRET";
pub const DISCORD_TOKEN: &str = "DISCORD_TOKEN";
pub const HOME_GUILD: &str = "HOME_GUILD";

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    profiles: HashMap<String, WatchConfigRecord>,
}

/// Reads one profile of a TOML file.
///
/// ```toml
/// [profiles.default]
/// follow = ["783214"]
/// track = ["rustlang"]
/// feed_channel_id = "123456789012345678"
/// ```
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
    profile: String,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            profile: profile.into(),
        }
    }

    /// Extract the configured profile. A missing profile is not an error.
    pub fn parse(&self, contents: &str) -> std::result::Result<Option<WatchConfigRecord>, ConfigError> {
        let mut file: ConfigFile = toml::from_str(contents).map_err(|e| {
            ConfigError::unreadable(format!("{}: {}", self.path.display(), e))
        })?;

        let record = file.profiles.remove(&self.profile);
        if record.is_none() {
            warn!(
                path = %self.path.display(),
                profile = %self.profile,
                "Profile not found in configuration file"
            );
        }
        Ok(record)
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> std::result::Result<Option<WatchConfigRecord>, ConfigError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                debug!(path = %self.path.display(), "Read configuration file");
                self.parse(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Configuration file not found");
                Ok(None)
            }
            Err(e) => Err(ConfigError::unreadable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

/// Secrets and identifiers taken from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub twitter: OAuthCredentials,
    pub discord_token: String,
    pub home_guild: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any lookup. Every missing or empty variable is reported.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();
        let mut get = |key: &'static str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_none() {
                missing.push(key);
            }
            value.unwrap_or_default()
        };

        let credentials = Self {
            twitter: OAuthCredentials {
                consumer_key: get(TWITTER_CONSUMER_KEY),
                consumer_secret: get(TWITTER_CONSUMER_SECRET),
                token: get(TWITTER_ACCESS_TOKEN_KEY),
                token_secret: get(TWITTER_ACCESS_TOKEN_SECRET),
            },
            discord_token: get(DISCORD_TOKEN),
            home_guild: get(HOME_GUILD),
        };

        if missing.is_empty() {
            Ok(credentials)
        } else {
            Err(AppError::MissingEnv(missing))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("twitter", &self.twitter)
            .field("discord_token", &"<redacted>")
            .field("home_guild", &self.home_guild)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tweetwatch::WatchConfig;

    const SAMPLE: &str = r#"
[profiles.default]
follow = ["783214", "17874544"]
track = ["rustlang"]
feed_channel_id = "123456789012345678"

[profiles.partial]
follow = ["1"]
"#;

    #[tokio::test]
    async fn test_load_profile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = FileConfigSource::new(file.path(), DEFAULT_PROFILE);
        let record = source.load().await.unwrap().unwrap();
        let config = WatchConfig::from_record(Some(record)).unwrap();
        assert_eq!(config.follow_ids.len(), 2);
        assert!(config.track_keywords.contains("rustlang"));
        assert_eq!(config.destination_channel_id, "123456789012345678");
    }

    #[tokio::test]
    async fn test_partial_profile_reports_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let record = FileConfigSource::new(file.path(), "partial")
            .load()
            .await
            .unwrap();
        let err = WatchConfig::from_record(record).unwrap_err();
        assert_eq!(err.to_string(), "Missing data for track list, feed channel ID");
    }

    #[tokio::test]
    async fn test_missing_file_and_profile_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfigSource::new(dir.path().join("nope.toml"), DEFAULT_PROFILE);
        assert_eq!(source.load().await.unwrap(), None);

        let source = FileConfigSource::new("tweetcord.toml", "unknown");
        assert_eq!(source.parse(SAMPLE).unwrap(), None);
    }

    #[test]
    fn test_invalid_toml_is_unreadable() {
        let source = FileConfigSource::new("tweetcord.toml", DEFAULT_PROFILE);
        assert!(matches!(
            source.parse("[profiles.default\nfollow = 1"),
            Err(ConfigError::Source(_))
        ));
    }

    #[test]
    fn test_credentials_report_every_missing_variable() {
        let err = Credentials::from_lookup(|key| match key {
            TWITTER_CONSUMER_KEY | TWITTER_CONSUMER_SECRET => Some("x".to_string()),
            HOME_GUILD => Some("  ".to_string()),
            _ => None,
        })
        .unwrap_err();

        match err {
            AppError::MissingEnv(missing) => assert_eq!(
                missing,
                vec![
                    TWITTER_ACCESS_TOKEN_KEY,
                    TWITTER_ACCESS_TOKEN_SECRET,
                    DISCORD_TOKEN,
                    HOME_GUILD,
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_credentials_complete() {
        let credentials = Credentials::from_lookup(|key| Some(format!("{key}-value"))).unwrap();
        assert_eq!(credentials.home_guild, "HOME_GUILD-value");
        assert_eq!(credentials.twitter.token, "TWITTER_ACCESS_TOKEN_KEY-value");
        assert!(!format!("{credentials:?}").contains("DISCORD_TOKEN-value"));
    }
}
