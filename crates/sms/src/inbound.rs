use serde::Deserialize;
use thiserror::Error;

use vaxline_core::domain::message::{InboundMessage, SenderId};

/// Fields of a Twilio Messaging webhook we care about. Twilio sends many
/// more (`AccountSid`, `NumMedia`, `To`, ...); they are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TwilioInbound {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("inbound message has no `From` sender")]
    MissingSender,
    #[error("sender `{0}` has no characters usable in a session key")]
    UnusableSender(String),
}

impl TwilioInbound {
    pub fn new(body: impl Into<String>, from: impl Into<String>) -> Self {
        Self { body: body.into(), from: from.into(), message_sid: None }
    }

    pub fn with_message_sid(mut self, message_sid: impl Into<String>) -> Self {
        self.message_sid = Some(message_sid.into());
        self
    }

    /// `MessageSid` when Twilio supplied a non-blank one.
    pub fn correlation_id(&self) -> Option<&str> {
        self.message_sid.as_deref().map(str::trim).filter(|sid| !sid.is_empty())
    }

    /// The body is passed through untouched (an empty body is still a message);
    /// a sender that cannot key a session is rejected.
    pub fn to_inbound_message(&self) -> Result<InboundMessage, InboundError> {
        let sender = self.from.trim();
        if sender.is_empty() {
            return Err(InboundError::MissingSender);
        }
        if SenderId(sender.to_string()).session_key().is_empty() {
            return Err(InboundError::UnusableSender(sender.to_string()));
        }
        Ok(InboundMessage::new(self.body.clone(), sender))
    }
}
