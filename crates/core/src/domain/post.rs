use serde::{Deserialize, Serialize};

/// A message record as delivered by the server. `root_id` is empty for
/// top-level posts and carries the thread root for replies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub root_id: String,
}

/// Outbound message, constructed per send and not retained.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostDraft {
    pub channel_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

impl PostDraft {
    pub fn new(channel_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), message: message.into(), root_id: None }
    }

    /// Threads this draft under the given parent post.
    pub fn in_reply_to(mut self, parent_id: impl Into<String>) -> Self {
        self.root_id = Some(parent_id.into());
        self
    }
}
