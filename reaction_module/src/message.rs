//! Message lookup for the reacted-to message.

/// Everything the row needs from the chat platform about one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMessage {
    pub ts: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub permalink: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageResolutionError {
    #[error("message {ts} not found in {channel_id}")]
    NotFound { channel_id: String, ts: String },
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("chat api error: {0}")]
    Api(String),
}

pub trait MessageResolver: Send + Sync {
    /// Fetch text, author display name and permalink for `(channel, ts)`.
    fn resolve(&self, channel_id: &str, ts: &str) -> Result<ResolvedMessage, MessageResolutionError>;

    /// Display name for a user id.
    fn display_name(&self, user_id: &str) -> Result<String, MessageResolutionError>;
}
