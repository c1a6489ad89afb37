// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tally emit` - Submit an activity event

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use clap::Args;
use tally_core::EventDraft;

#[derive(Args)]
pub struct EmitArgs {
    /// Event type (view, search, like, comment, ...)
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: String,

    #[arg(long = "video")]
    pub video_id: Option<String>,

    #[arg(long = "user")]
    pub user_id: Option<String>,

    /// RFC 3339 timestamp; defaults to now
    #[arg(long)]
    pub timestamp: Option<String>,

    /// Extra payload entry, repeatable
    #[arg(long = "payload", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub payload: Vec<(String, String)>,
}

impl EmitArgs {
    pub fn into_draft(self) -> EventDraft {
        EventDraft {
            timestamp: self
                .timestamp
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            kind: self.kind,
            video_id: self.video_id.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
            payload: self.payload.into_iter().collect::<BTreeMap<_, _>>(),
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        simple = { "src=feed", "src", "feed" },
        empty_value = { "src=", "src", "" },
        equals_in_value = { "q=a=b", "q", "a=b" },
    )]
    fn payload_pairs_parse(raw: &str, key: &str, value: &str) {
        assert_eq!(
            parse_key_val(raw).unwrap(),
            (key.to_string(), value.to_string())
        );
    }

    #[parameterized(
        no_separator = { "src" },
        empty_key = { "=feed" },
    )]
    fn malformed_payload_is_rejected(raw: &str) {
        assert!(parse_key_val(raw).is_err());
    }

    #[test]
    fn draft_defaults_to_a_parseable_now() {
        let draft = EmitArgs {
            kind: "view".to_string(),
            video_id: Some("v1".to_string()),
            user_id: None,
            timestamp: None,
            payload: vec![("src".to_string(), "feed".to_string())],
        }
        .into_draft();

        assert!(chrono::DateTime::parse_from_rfc3339(&draft.timestamp).is_ok());
        assert_eq!(draft.user_id, "");
        assert_eq!(draft.payload["src"], "feed");
    }
}
