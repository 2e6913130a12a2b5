//! Tweetcord: relays tweets from a watchlist of accounts into a Discord
//! channel.
//!
//! The relay engine lives in [`tweetwatch`]; this crate provides its concrete
//! collaborators:
//! - [`config::FileConfigSource`] - watch profile from a TOML file
//! - [`twitter::TwitterTransport`] - OAuth-signed filtered stream
//! - [`discord::DiscordClient`] - channel resolution and embed delivery

pub mod cli;
pub mod config;
pub mod discord;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod twitter;

pub use error::{AppError, Result};
