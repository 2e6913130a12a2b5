//! Wire codec for the provider's newline-delimited stream.
//!
//! Each line is either a post, a control notice (`limit`, `disconnect`,
//! `warning`, `delete`, ...) or an empty keep-alive.

use serde::Deserialize;
use serde_json::Value;

use crate::post::RawPost;
use crate::stream::TransportError;

/// One decoded line of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A post matching the filter
    Post(Box<RawPost>),
    /// Blank keep-alive line
    KeepAlive,
    /// The provider dropped `undelivered` matching posts due to volume
    Limit { undelivered: u64 },
    /// The provider is about to close the connection
    Disconnect {
        code: u32,
        stream_name: Option<String>,
        reason: Option<String>,
    },
    /// Stall warning: the client is falling behind
    Warning {
        code: String,
        message: String,
        percent_full: Option<u32>,
    },
    /// A previously delivered post was deleted
    Delete { id: String, user_id: String },
    /// Any other notice, identified by its top-level key
    Other(String),
}

impl StreamMessage {
    pub fn kind(&self) -> &str {
        match self {
            Self::Post(_) => "post",
            Self::KeepAlive => "keep_alive",
            Self::Limit { .. } => "limit",
            Self::Disconnect { .. } => "disconnect",
            Self::Warning { .. } => "warning",
            Self::Delete { .. } => "delete",
            Self::Other(kind) => kind,
        }
    }
}

#[derive(Deserialize)]
struct LimitNotice {
    #[serde(default)]
    track: u64,
}

#[derive(Deserialize)]
struct DisconnectNotice {
    code: u32,
    #[serde(default)]
    stream_name: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct WarningNotice {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    percent_full: Option<u32>,
}

#[derive(Deserialize)]
struct DeleteNotice {
    status: DeletedStatus,
}

#[derive(Deserialize)]
struct DeletedStatus {
    id_str: String,
    user_id_str: String,
}

/// Decode one line of the stream.
pub fn decode_message(line: &str) -> Result<StreamMessage, TransportError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(StreamMessage::KeepAlive);
    }

    let mut value: Value = serde_json::from_str(line).map_err(TransportError::decode)?;
    let Some(object) = value.as_object_mut() else {
        return Err(TransportError::decode("stream message is not a JSON object"));
    };

    if let Some(limit) = object.remove("limit") {
        let notice: LimitNotice = serde_json::from_value(limit).map_err(TransportError::decode)?;
        return Ok(StreamMessage::Limit {
            undelivered: notice.track,
        });
    }

    if let Some(disconnect) = object.remove("disconnect") {
        let notice: DisconnectNotice =
            serde_json::from_value(disconnect).map_err(TransportError::decode)?;
        return Ok(StreamMessage::Disconnect {
            code: notice.code,
            stream_name: notice.stream_name,
            reason: notice.reason,
        });
    }

    if let Some(warning) = object.remove("warning") {
        let notice: WarningNotice =
            serde_json::from_value(warning).map_err(TransportError::decode)?;
        return Ok(StreamMessage::Warning {
            code: notice.code,
            message: notice.message,
            percent_full: notice.percent_full,
        });
    }

    if let Some(delete) = object.remove("delete") {
        let notice: DeleteNotice = serde_json::from_value(delete).map_err(TransportError::decode)?;
        return Ok(StreamMessage::Delete {
            id: notice.status.id_str,
            user_id: notice.status.user_id_str,
        });
    }

    if object.contains_key("id_str") && object.contains_key("user") {
        let post: RawPost = serde_json::from_value(value).map_err(TransportError::decode)?;
        return Ok(StreamMessage::Post(Box::new(post)));
    }

    let kind = object
        .keys()
        .next()
        .cloned()
        .unwrap_or_else(|| "empty".to_string());
    Ok(StreamMessage::Other(kind))
}
