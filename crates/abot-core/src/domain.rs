use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// A known sender, as last seen by the bot.
///
/// Equality is structural over every field so profile drift (renames,
/// username changes) is detectable by comparing against the stored record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndUser {
    pub id: UserId,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl EndUser {
    pub fn new(
        id: i64,
        first_name: impl Into<String>,
        last_name: Option<&str>,
        username: Option<&str>,
    ) -> Self {
        Self {
            id: UserId(id),
            first_name: first_name.into(),
            last_name: last_name.map(str::to_string),
            username: username.map(str::to_string),
        }
    }

    /// First and last name joined by a space (last name omitted when empty).
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.trim().is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }

    /// Case-insensitive username match (no `@`).
    pub fn has_username(&self, username: &str) -> bool {
        self.username
            .as_deref()
            .map(|u| u.eq_ignore_ascii_case(username))
            .unwrap_or(false)
    }
}
