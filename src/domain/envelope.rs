//! Inbound wire envelope.
//!
//! Peers send JSON objects of the form
//!
//! ```json
//! {"action": "publish", "topic": "chat", "msg": {"text": "hi"}}
//! ```
//!
//! The `action` tag is inspected exactly once, in [`Envelope::decode`];
//! everything downstream matches on the resulting enum.

use serde::Deserialize;
use serde_json::value::RawValue;

use super::session::OutboundMessage;
use crate::error::EnvelopeError;

/// Notice sent back when a frame cannot be decoded.
pub const INVALID_MESSAGE: &str = "invalid message";

/// Notice sent back when the action is not recognised.
pub const INVALID_ACTION: &str = "invalid action";

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Subscribe the sender to `topic`.
    Subscribe {
        /// Topic to subscribe to.
        topic: String,
    },
    /// Publish `payload` to every subscriber of `topic`.
    Publish {
        /// Target topic.
        topic: String,
        /// Raw JSON text of `msg`; empty when `msg` was absent, `null` or `""`.
        payload: OutboundMessage,
    },
    /// Any other action.
    Unknown {
        /// The action as received (empty when missing).
        action: String,
    },
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    action: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    msg: Option<Box<RawValue>>,
}

impl Envelope {
    /// Decodes a frame that has already been through [`normalize`].
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] if the frame is not a JSON
    /// object with string `action`/`topic` fields.
    pub fn decode(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope = serde_json::from_slice(frame)?;
        Ok(match wire.action.as_str() {
            "subscribe" => Self::Subscribe { topic: wire.topic },
            "publish" => {
                // `null` and `""` carry nothing to deliver and are treated
                // like an absent `msg`; any other value is forwarded verbatim.
                let payload = match wire.msg.as_deref().map(RawValue::get) {
                    None | Some("null") | Some("\"\"") => OutboundMessage::from(""),
                    Some(raw) => OutboundMessage::from(raw),
                };
                Self::Publish {
                    topic: wire.topic,
                    payload,
                }
            }
            _ => Self::Unknown {
                action: wire.action,
            },
        })
    }
}

/// Replaces embedded line breaks with spaces and trims surrounding
/// whitespace.
#[must_use]
pub fn normalize(frame: &[u8]) -> Vec<u8> {
    frame
        .iter()
        .map(|b| if matches!(b, b'\n' | b'\r') { b' ' } else { *b })
        .collect::<Vec<u8>>()
        .trim_ascii()
        .to_vec()
}
