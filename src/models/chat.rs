use chrono::{ DateTime, SecondsFormat, Utc };
use serde::{ Deserialize, Deserializer, Serialize, Serializer };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Originator {
    Bot,
    User,
}

impl Originator {
    pub fn is_bot(self) -> bool {
        matches!(self, Originator::Bot)
    }
}

impl From<bool> for Originator {
    fn from(is_bot: bool) -> Self {
        if is_bot { Originator::Bot } else { Originator::User }
    }
}

/// One entry of a conversation, stored exactly as the browser widget stores it:
/// `{ "id", "text", "isBot", "timestamp" }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    #[serde(rename = "isBot", with = "is_bot_flag")]
    pub originator: Originator,
    #[serde(with = "js_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn is_bot(&self) -> bool {
        self.originator.is_bot()
    }
}

mod is_bot_flag {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Originator, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(value.is_bot())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Originator, D::Error> {
        bool::deserialize(d).map(Originator::from)
    }
}

// Matches `Date.prototype.toJSON`: millisecond precision with a `Z` suffix.
mod js_timestamp {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
    }
}
