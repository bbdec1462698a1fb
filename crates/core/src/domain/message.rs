use serde::{Deserialize, Serialize};

/// Stable identity of the person texting the bot (the carrier `From` value).
///
/// Used both as the NLU session key and as the reminder primary key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SenderId(pub String);

impl SenderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Session-safe form of the identifier: keeps `[A-Za-z0-9_-]` and drops the
    /// rest (`+15551234567` becomes `15551234567`).
    pub fn session_key(&self) -> String {
        self.0
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-')
            .collect()
    }
}

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub text: String,
    pub sender_id: SenderId,
}

impl InboundMessage {
    pub fn new(text: impl Into<String>, sender_id: impl Into<String>) -> Self {
        Self { text: text.into(), sender_id: SenderId(sender_id.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
