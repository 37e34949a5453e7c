use pulsebot_core::domain::post::Post;

use crate::bootstrap::ReadySession;

/// Status keywords, scanned in order; the first whole-word hit wins.
pub const STATUS_KEYWORDS: [&str; 4] = ["alive", "up", "running", "hello"];
pub const STATUS_REPLY: &str = "Yes I'm running";
pub const FALLBACK_REPLY: &str = "I did not understand you!";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub body: &'static str,
    pub parent_id: String,
}

/// Maps a posted message to at most one reply. Stateless beyond the two ids
/// resolved at bootstrap.
#[derive(Clone, Debug)]
pub struct ReplyRules {
    log_channel_id: String,
    bot_user_id: String,
}

impl ReplyRules {
    pub fn new(log_channel_id: impl Into<String>, bot_user_id: impl Into<String>) -> Self {
        Self { log_channel_id: log_channel_id.into(), bot_user_id: bot_user_id.into() }
    }

    /// `None` when the session runs degraded without a logging channel.
    pub fn for_session(ready: &ReadySession) -> Option<Self> {
        ready
            .log_channel
            .as_ref()
            .map(|channel| Self::new(channel.id.clone(), ready.bot.id.clone()))
    }

    /// Guard clauses first: only the logging channel is watched, and the
    /// bot's own posts must never trigger a reply (self-reply loop).
    pub fn evaluate(&self, broadcast_channel_id: &str, post: &Post) -> Option<Reply> {
        if broadcast_channel_id != self.log_channel_id {
            return None;
        }
        if post.user_id == self.bot_user_id {
            return None;
        }

        for keyword in STATUS_KEYWORDS {
            if contains_word(&post.message, keyword) {
                return Some(Reply { body: STATUS_REPLY, parent_id: post.id.clone() });
            }
        }

        Some(Reply { body: FALLBACK_REPLY, parent_id: post.id.clone() })
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Case-sensitive whole-word search: a hit counts only when neither
/// neighbor is a word character, so "up!" matches "up" but "upstairs"
/// does not.
fn contains_word(body: &str, token: &str) -> bool {
    let mut offset = 0;
    while let Some(found) = body[offset..].find(token) {
        let begin = offset + found;
        let end = begin + token.len();

        let left_clear = body[..begin].chars().next_back().map_or(true, |ch| !is_word_char(ch));
        let right_clear = body[end..].chars().next().map_or(true, |ch| !is_word_char(ch));
        if left_clear && right_clear {
            return true;
        }

        offset = end;
    }

    false
}
