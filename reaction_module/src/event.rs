//! Slack Events API payloads and the reaction event the pipeline consumes.

use std::fmt;

use serde::Deserialize;

/// Identity of the reacted-to message: `channel:message_ts`.
///
/// The reacting user is deliberately not part of the key, so a second user
/// adding the same reaction to the same message maps to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new(channel_id: &str, message_ts: &str) -> Self {
        EventId(format!("{}:{}", channel_id, message_ts))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `reaction_added` occurrence on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    /// User who added the reaction
    pub user: String,
    /// Reaction name without colons, e.g. `white_check_mark`
    pub reaction: String,
    pub channel_id: String,
    /// Timestamp of the reacted-to message; doubles as its id
    pub message_ts: String,
    /// Author of the reacted-to message, when Slack includes it
    pub item_user: Option<String>,
    pub event_ts: Option<String>,
}

impl ReactionEvent {
    pub fn event_id(&self) -> EventId {
        EventId::new(&self.channel_id, &self.message_ts)
    }
}

/// Top-level body posted to the events endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        team_id: Option<String>,
        #[serde(default)]
        event_id: Option<String>,
        event: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ReactionAddedPayload {
    user: String,
    reaction: String,
    item: ReactionItem,
    #[serde(default)]
    item_user: Option<String>,
    #[serde(default)]
    event_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReactionItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Extract a reaction event from an `event_callback` inner event.
///
/// Returns `None` for other event types and for reactions on files or file
/// comments, which have no channel/ts pair.
pub fn parse_reaction_added(event: &serde_json::Value) -> Option<ReactionEvent> {
    if event.get("type").and_then(|value| value.as_str()) != Some("reaction_added") {
        return None;
    }
    let payload: ReactionAddedPayload = serde_json::from_value(event.clone()).ok()?;
    if payload.item.kind != "message" {
        return None;
    }
    let channel_id = payload.item.channel.filter(|value| !value.is_empty())?;
    let message_ts = payload.item.ts.filter(|value| !value.is_empty())?;
    Some(ReactionEvent {
        user: payload.user,
        reaction: payload.reaction,
        channel_id,
        message_ts,
        item_user: payload.item_user,
        event_ts: payload.event_ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_id_ignores_actor() {
        let first = ReactionEvent {
            user: "U1".to_string(),
            reaction: "white_check_mark".to_string(),
            channel_id: "C1".to_string(),
            message_ts: "1700000000.000100".to_string(),
            item_user: None,
            event_ts: None,
        };
        let second = ReactionEvent {
            user: "U2".to_string(),
            ..first.clone()
        };
        assert_eq!(first.event_id(), second.event_id());
        assert_eq!(first.event_id().as_str(), "C1:1700000000.000100");
    }

    #[test]
    fn parses_url_verification() {
        let envelope: SlackEnvelope = serde_json::from_value(json!({
            "token": "t",
            "challenge": "abc123",
            "type": "url_verification"
        }))
        .expect("parse");
        assert!(matches!(envelope, SlackEnvelope::UrlVerification { challenge } if challenge == "abc123"));
    }

    #[test]
    fn parses_reaction_added_callback() {
        let envelope: SlackEnvelope = serde_json::from_value(json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev1",
            "event": {
                "type": "reaction_added",
                "user": "U1",
                "reaction": "white_check_mark",
                "item": { "type": "message", "channel": "C1", "ts": "1700000000.000100" },
                "item_user": "U2",
                "event_ts": "1700000100.000200"
            }
        }))
        .expect("parse");

        let SlackEnvelope::EventCallback { event, team_id, .. } = envelope else {
            panic!("expected event callback");
        };
        assert_eq!(team_id.as_deref(), Some("T1"));
        let reaction = parse_reaction_added(&event).expect("reaction");
        assert_eq!(reaction.user, "U1");
        assert_eq!(reaction.channel_id, "C1");
        assert_eq!(reaction.message_ts, "1700000000.000100");
        assert_eq!(reaction.item_user.as_deref(), Some("U2"));
    }

    #[test]
    fn ignores_file_reactions_and_other_events() {
        let file_reaction = json!({
            "type": "reaction_added",
            "user": "U1",
            "reaction": "white_check_mark",
            "item": { "type": "file", "file": "F1" }
        });
        assert!(parse_reaction_added(&file_reaction).is_none());

        let removed = json!({
            "type": "reaction_removed",
            "user": "U1",
            "reaction": "white_check_mark",
            "item": { "type": "message", "channel": "C1", "ts": "1.0" }
        });
        assert!(parse_reaction_added(&removed).is_none());
    }

    #[test]
    fn unknown_envelope_types_are_other() {
        let envelope: SlackEnvelope =
            serde_json::from_value(json!({ "type": "app_rate_limited" })).expect("parse");
        assert!(matches!(envelope, SlackEnvelope::Other));
    }
}
