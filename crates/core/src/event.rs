// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-activity events and boundary validation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Event type that carries view counts and distinct users
pub const VIEW_EVENT: &str = "view";

/// A validated, immutable activity event
///
/// This is also the exact shape of one WAL line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub video_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, String>,
}

impl Event {
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: impl Into<String>,
        video_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: kind.into(),
            video_id: video_id.into(),
            user_id: user_id.into(),
            payload: BTreeMap::new(),
        }
    }

    /// Convenience constructor for a view event
    pub fn view(
        timestamp: DateTime<Utc>,
        video_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self::new(timestamp, VIEW_EVENT, video_id, user_id)
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// UTC calendar date of the event; the sole partitioning key
    pub fn day_key(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Errors raised while turning an untrusted draft into an [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },
    #[error("event type must not be empty")]
    EmptyType,
    #[error("{field} must not contain control characters")]
    ControlCharacter { field: &'static str },
}

/// Raw event as received at the process boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventDraft {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub payload: BTreeMap<String, String>,
}

impl EventDraft {
    /// Validate and normalize the draft
    ///
    /// The timestamp must be RFC 3339 (any offset, normalized to UTC). The
    /// type is trimmed and lower-cased and must not be empty. Ids are trimmed
    /// and must not contain control characters.
    pub fn validate(self) -> Result<Event, ValidationError> {
        let timestamp = DateTime::parse_from_rfc3339(self.timestamp.trim())
            .map_err(|e| ValidationError::Timestamp {
                value: self.timestamp.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        let kind = self.kind.trim().to_lowercase();
        if kind.is_empty() {
            return Err(ValidationError::EmptyType);
        }

        // Segment files are line-oriented
        let video_id = plain_field("video_id", &self.video_id)?;
        let user_id = plain_field("user_id", &self.user_id)?;

        Ok(Event {
            timestamp,
            kind,
            video_id,
            user_id,
            payload: self.payload,
        })
    }
}

fn plain_field(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacter { field });
    }
    Ok(value.to_string())
}

impl TryFrom<EventDraft> for Event {
    type Error = ValidationError;

    fn try_from(draft: EventDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
