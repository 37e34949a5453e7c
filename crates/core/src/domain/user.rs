use serde::{Deserialize, Serialize};

use crate::config::BotConfig;

/// Identity of a chat account as reported by the server. Doubles as the
/// bot's own session identity and as the author identity carried on posts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserProfile {
    /// Returns the profile rewritten to the configured display identity when
    /// any of username/first/last differ, `None` when it already matches.
    pub fn normalized_for(&self, desired: &BotConfig) -> Option<UserProfile> {
        let matches = self.username == desired.username
            && self.first_name == desired.first_name
            && self.last_name == desired.last_name;
        if matches {
            return None;
        }

        let mut updated = self.clone();
        updated.username = desired.username.clone();
        updated.first_name = desired.first_name.clone();
        updated.last_name = desired.last_name.clone();
        Some(updated)
    }
}
