//! Channel visibility used as the pipeline's access filter.

use std::fmt;

/// Visibility of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Public,
    Private,
    DirectMessage,
}

impl ChannelKind {
    /// The direct-message flag wins over the private flag; Slack reports
    /// IMs as private too.
    pub fn from_flags(is_im: bool, is_private: bool) -> Self {
        if is_im {
            ChannelKind::DirectMessage
        } else if is_private {
            ChannelKind::Private
        } else {
            ChannelKind::Public
        }
    }

    /// Whether reactions in this kind of channel may be recorded.
    pub fn is_recordable(self) -> bool {
        matches!(self, ChannelKind::Public | ChannelKind::DirectMessage)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Public => "public",
            ChannelKind::Private => "private",
            ChannelKind::DirectMessage => "dm",
        };
        f.write_str(name)
    }
}

/// Channel metadata as reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: Option<String>,
    pub is_private: bool,
    pub is_im: bool,
}

impl ChannelInfo {
    pub fn kind(&self) -> ChannelKind {
        ChannelKind::from_flags(self.is_im, self.is_private)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("channel lookup failed for {channel_id}: {reason}")]
pub struct ChannelLookupError {
    pub channel_id: String,
    pub reason: String,
}

pub trait ChannelClassifier: Send + Sync {
    fn classify(&self, channel_id: &str) -> Result<ChannelKind, ChannelLookupError>;
}
