//! Blocking Slack Web API client for the lookups the pipeline needs.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, error};

use crate::channel::{ChannelClassifier, ChannelInfo, ChannelKind, ChannelLookupError};
use crate::message::{MessageResolutionError, MessageResolver, ResolvedMessage};

pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";

const UNKNOWN_USER: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum SlackApiError {
    #[error("http error: {0}")]
    Http(String),
    #[error("slack api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("slack api error: {0}")]
    Api(String),
    #[error("failed to parse slack response: {0}")]
    Parse(String),
}

/// A message as returned by `conversations.history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackMessage {
    pub ts: String,
    /// Absent on legacy bot and webhook posts.
    pub user: Option<String>,
    /// Display name those posts carry instead of a user id.
    pub username: Option<String>,
    pub bot_id: Option<String>,
    pub text: String,
}

#[derive(Debug)]
pub struct SlackWebClient {
    bot_token: String,
    api_base: String,
    user_names: Mutex<HashMap<String, String>>,
}

impl SlackWebClient {
    /// Create a client; `SLACK_API_BASE_URL` overrides the API host.
    pub fn new(bot_token: impl Into<String>) -> Self {
        let api_base = std::env::var("SLACK_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE_URL.to_string());
        Self::with_api_base(bot_token, api_base)
    }

    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: api_base.into(),
            user_names: Mutex::new(HashMap::new()),
        }
    }

    fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, SlackApiError> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), method);
        let client = reqwest::blocking::Client::new();
        let response = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .query(params)
            .send()
            .map_err(|e| SlackApiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("Slack {} returned {}: {}", method, status, body);
            return Err(SlackApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| SlackApiError::Parse(e.to_string()))?;

        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let error = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            return Err(SlackApiError::Api(error.to_string()));
        }
        Ok(body)
    }

    /// `conversations.info`.
    pub fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, SlackApiError> {
        let body = self.call("conversations.info", &[("channel", channel_id)])?;
        let channel = body
            .get("channel")
            .ok_or_else(|| SlackApiError::Parse("missing channel".to_string()))?;
        let info = ChannelInfo {
            id: channel
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or(channel_id)
                .to_string(),
            name: channel
                .get("name")
                .and_then(|v| v.as_str())
                .map(|name| name.to_string()),
            is_private: flag(channel, "is_private"),
            is_im: flag(channel, "is_im"),
        };
        debug!(
            "channel {} ({}) is {}",
            info.id,
            info.name.as_deref().unwrap_or("-"),
            info.kind()
        );
        Ok(info)
    }

    /// The single message at `ts` via `conversations.history`.
    pub fn fetch_message(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<SlackMessage>, SlackApiError> {
        let body = self.call(
            "conversations.history",
            &[
                ("channel", channel_id),
                ("latest", ts),
                ("limit", "1"),
                ("inclusive", "true"),
            ],
        )?;
        let message = body
            .get("messages")
            .and_then(|v| v.as_array())
            .and_then(|messages| messages.first())
            // `latest` is an upper bound; an older message means ours is gone
            // or lives in a thread.
            .filter(|message| {
                string_field(message, "ts").map_or(true, |found| found == ts)
            });
        Ok(message.map(|message| SlackMessage {
            ts: string_field(message, "ts").unwrap_or_else(|| ts.to_string()),
            user: string_field(message, "user"),
            username: string_field(message, "username"),
            bot_id: string_field(message, "bot_id"),
            text: string_field(message, "text").unwrap_or_default(),
        }))
    }

    /// Best available name for a user, cached per process.
    pub fn user_display_name(&self, user_id: &str) -> Result<String, SlackApiError> {
        if let Some(name) = lock(&self.user_names).get(user_id) {
            return Ok(name.clone());
        }

        let body = self.call("users.info", &[("user", user_id)])?;
        let user = body
            .get("user")
            .ok_or_else(|| SlackApiError::Api("user_not_found".to_string()))?;
        let profile = user.get("profile");
        let name = profile
            .and_then(|p| string_field(p, "display_name"))
            .or_else(|| profile.and_then(|p| string_field(p, "real_name")))
            .or_else(|| string_field(user, "name"))
            .unwrap_or_else(|| UNKNOWN_USER.to_string());

        debug!("resolved slack user {} to {}", user_id, name);
        lock(&self.user_names).insert(user_id.to_string(), name.clone());
        Ok(name)
    }

    /// `chat.getPermalink`.
    pub fn permalink(&self, channel_id: &str, ts: &str) -> Result<String, SlackApiError> {
        let body = self.call(
            "chat.getPermalink",
            &[("channel", channel_id), ("message_ts", ts)],
        )?;
        string_field(&body, "permalink")
            .ok_or_else(|| SlackApiError::Parse("missing permalink".to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Non-empty string field.
fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

impl ChannelClassifier for SlackWebClient {
    fn classify(&self, channel_id: &str) -> Result<ChannelKind, ChannelLookupError> {
        self.channel_info(channel_id)
            .map(|info| info.kind())
            .map_err(|err| ChannelLookupError {
                channel_id: channel_id.to_string(),
                reason: err.to_string(),
            })
    }
}

impl MessageResolver for SlackWebClient {
    fn resolve(&self, channel_id: &str, ts: &str) -> Result<ResolvedMessage, MessageResolutionError> {
        let message = self
            .fetch_message(channel_id, ts)
            .map_err(|err| MessageResolutionError::Api(err.to_string()))?
            .ok_or_else(|| MessageResolutionError::NotFound {
                channel_id: channel_id.to_string(),
                ts: ts.to_string(),
            })?;

        // Legacy bot posts have no user id, only a display name.
        let (author_id, author_name) = match message.user {
            Some(user) => {
                let name = self.display_name(&user)?;
                (user, name)
            }
            None => (
                message.bot_id.unwrap_or_default(),
                message
                    .username
                    .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            ),
        };

        let permalink = self
            .permalink(channel_id, ts)
            .map_err(|err| MessageResolutionError::Api(err.to_string()))?;

        Ok(ResolvedMessage {
            ts: message.ts,
            author_id,
            author_name,
            text: message.text,
            permalink,
        })
    }

    fn display_name(&self, user_id: &str) -> Result<String, MessageResolutionError> {
        self.user_display_name(user_id).map_err(|err| match err {
            SlackApiError::Api(code) if code == "user_not_found" => {
                MessageResolutionError::UserNotFound(user_id.to_string())
            }
            other => MessageResolutionError::Api(other.to_string()),
        })
    }
}
