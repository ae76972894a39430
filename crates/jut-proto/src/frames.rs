//! Outbound frames and the channel handshake reply.
//!
//! # Example
//!
//! ```rust
//! use jut_proto::frames::{parse_handshake_reply, ClientFrame, HandshakeReply};
//!
//! let hello = ClientFrame::handshake("secret", Some("job-1".into()));
//! let json = hello.to_json().unwrap();
//! assert!(json.contains("accessToken"));
//!
//! let reply = parse_handshake_reply(r#"{"channel_id": "ch-7"}"#).unwrap();
//! assert_eq!(reply, HandshakeReply::Assigned { channel_id: "ch-7".into() });
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::events::NONEXISTENT_JOB;
use crate::ProtoError;

/// Frames the client writes onto the channel socket.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ClientFrame {
    /// First frame on every connection.
    Handshake {
        /// Bearer token.
        #[serde(rename = "accessToken")]
        access_token: String,
        /// Existing job to attach to.
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
    },
    /// Heartbeat answer.
    Pong {
        /// Always `true`.
        pong: bool,
    },
    /// Re-authentication on an open socket.
    Refresh {
        /// Fresh bearer token.
        #[serde(rename = "accessToken")]
        access_token: String,
    },
}

impl ClientFrame {
    /// Create a handshake frame.
    #[must_use]
    pub fn handshake(access_token: impl Into<String>, job_id: Option<String>) -> Self {
        Self::Handshake {
            access_token: access_token.into(),
            job_id,
        }
    }

    /// Create the heartbeat reply.
    #[must_use]
    pub const fn pong() -> Self {
        Self::Pong { pong: true }
    }

    /// Create a credential refresh frame.
    #[must_use]
    pub fn refresh(access_token: impl Into<String>) -> Self {
        Self::Refresh {
            access_token: access_token.into(),
        }
    }

    /// Short name used in logs. Never includes the token.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "handshake",
            Self::Pong { .. } => "pong",
            Self::Refresh { .. } => "refresh",
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }
}

/// Reply to the handshake frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
    /// Server assigned a channel.
    Assigned {
        /// Channel identifier used for job submission.
        channel_id: String,
    },
    /// Attach target does not exist anymore.
    JobMissing,
}

/// Parse the single inbound frame that answers a handshake.
///
/// # Errors
///
/// Returns an error if the frame is not an object or lacks a string
/// `channel_id`.
pub fn parse_handshake_reply(text: &str) -> Result<HandshakeReply, ProtoError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = value else {
        return Err(ProtoError::NotAnObject(text.to_string()));
    };

    if map.get("error").and_then(Value::as_str) == Some(NONEXISTENT_JOB) {
        return Ok(HandshakeReply::JobMissing);
    }

    match map.get("channel_id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(HandshakeReply::Assigned {
            channel_id: id.clone(),
        }),
        Some(other) => Err(ProtoError::InvalidField {
            field: "channel_id",
            reason: format!("expected a non-empty string, got {other}"),
        }),
        None => Err(ProtoError::MissingField("channel_id")),
    }
}
