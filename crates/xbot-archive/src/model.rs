//! Record model for archived chat events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Opaque, URL-safe record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh identifier (32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender identity fields used for display names and activity stats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    /// Platform user id.
    pub id: Option<i64>,
    /// Handle without the leading `@`.
    pub username: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
}

impl Sender {
    /// Name shown in transcripts: `@handle`, then full name, then `User`.
    pub fn display_name(&self) -> String {
        if let Some(username) = non_empty(self.username.as_deref()) {
            return format!("@{username}");
        }
        match non_empty(self.first_name.as_deref()) {
            Some(first) => match non_empty(self.last_name.as_deref()) {
                Some(last) => format!("{first} {last}"),
                None => first.to_string(),
            },
            None => crate::window::FALLBACK_DISPLAY_NAME.to_string(),
        }
    }

    /// Given and family name joined, without the handle.
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default();
        match non_empty(self.last_name.as_deref()) {
            Some(last) => format!("{first} {last}"),
            None => first.to_string(),
        }
    }
}

/// A vote on a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAnswer {
    /// Vendor poll id.
    pub poll_id: String,
    /// Voter id when present.
    pub voter_id: Option<i64>,
    /// Selected option indexes.
    pub option_ids: Vec<i64>,
}

/// Inbound platform event, kept verbatim.
///
/// The archive only reads the conversation id, text body, sender and poll
/// answer out of it; every other field round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdatePayload(Value);

impl UpdatePayload {
    /// Wrap a raw event.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the raw event.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap the raw event.
    pub fn into_value(self) -> Value {
        self.0
    }

    fn message(&self) -> Option<&Value> {
        self.0.get("message").filter(|message| message.is_object())
    }

    /// Conversation the event belongs to.
    pub fn chat_id(&self) -> Option<i64> {
        self.message()?.get("chat")?.get("id")?.as_i64()
    }

    /// Non-empty text body.
    pub fn text(&self) -> Option<&str> {
        self.message()?
            .get("text")?
            .as_str()
            .filter(|text| !text.is_empty())
    }

    /// Sender of the message, if any.
    pub fn sender(&self) -> Option<Sender> {
        let from = self.message()?.get("from").filter(|from| from.is_object())?;
        let field = |name: &str| from.get(name).and_then(Value::as_str).map(str::to_string);
        Some(Sender {
            id: from.get("id").and_then(Value::as_i64),
            username: field("username"),
            first_name: field("first_name"),
            last_name: field("last_name"),
        })
    }

    /// Poll vote carried by the event.
    pub fn poll_answer(&self) -> Option<PollAnswer> {
        let answer = self.0.get("poll_answer").filter(|answer| answer.is_object())?;
        let poll_id = answer.get("poll_id")?.as_str()?.to_string();
        let option_ids = answer
            .get("option_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        Some(PollAnswer {
            poll_id,
            voter_id: answer
                .get("user")
                .and_then(|user| user.get("id"))
                .and_then(Value::as_i64),
            option_ids,
        })
    }
}

/// One archived inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEventRecord {
    /// Record identifier; assigned by the backend when absent.
    #[serde(default, alias = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Conversation id derived from the payload.
    #[serde(default, alias = "ChatID")]
    pub chat_id: Option<i64>,
    /// Raw event.
    #[serde(default, alias = "Update")]
    pub update: UpdatePayload,
    /// Unix seconds, set by the backend.
    #[serde(default, alias = "CreatedAt")]
    pub created_at: i64,
    /// Unix seconds, equal to `created_at`.
    #[serde(default, alias = "UpdatedAt")]
    pub updated_at: i64,
}

impl ChatEventRecord {
    /// New unsaved record for an inbound event.
    pub fn from_update(update: UpdatePayload) -> Self {
        Self {
            id: None,
            chat_id: update.chat_id(),
            update,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Text body of the event.
    pub fn text(&self) -> Option<&str> {
        self.update.text()
    }

    /// Sender of the event.
    pub fn sender(&self) -> Option<Sender> {
        self.update.sender()
    }

    /// Apply write-time fields and return the (possibly new) id.
    ///
    /// Timestamps always come from the backend and the conversation id always
    /// comes from the payload. A payload without a conversation leaves
    /// `chat_id` empty even if the caller set one.
    pub(crate) fn stamp(&mut self, now: i64) -> RecordId {
        self.created_at = now;
        self.updated_at = now;
        self.chat_id = self.update.chat_id();
        self.id.get_or_insert_with(RecordId::generate).clone()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
