use serde::{Deserialize, Serialize};

use crate::config::ChannelConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub team_id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(rename = "type", default)]
    pub channel_type: ChannelType,
}

/// Creation request for a channel that does not exist yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewChannel {
    pub team_id: String,
    pub name: String,
    pub display_name: String,
    pub purpose: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
}

impl NewChannel {
    /// An open channel built from the configured logging-channel metadata.
    pub fn open(team_id: impl Into<String>, config: &ChannelConfig) -> Self {
        Self {
            team_id: team_id.into(),
            name: config.name.clone(),
            display_name: config.display_name.clone(),
            purpose: config.purpose.clone(),
            channel_type: ChannelType::Open,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ChannelConfig;

    use super::{Channel, ChannelType, NewChannel};

    #[test]
    fn channel_type_uses_single_letter_wire_codes() {
        let channel: Channel = serde_json::from_str(
            r#"{
                "id": "c-1",
                "team_id": "t-1",
                "name": "pulsebot-status",
                "display_name": "Pulse Bot Status",
                "type": "O"
            }"#,
        )
        .expect("channel should deserialize");

        assert_eq!(channel.channel_type, ChannelType::Open);
    }

    #[test]
    fn open_channel_carries_configured_metadata() {
        let config = ChannelConfig {
            name: "pulsebot-status".to_string(),
            display_name: "Pulse Bot Status".to_string(),
            purpose: "Lifecycle announcements".to_string(),
        };

        let draft = NewChannel::open("t-9", &config);
        assert_eq!(draft.team_id, "t-9");
        assert_eq!(draft.channel_type, ChannelType::Open);

        let encoded = serde_json::to_value(&draft).expect("draft should serialize");
        assert_eq!(encoded["type"], "O");
        assert_eq!(encoded["display_name"], "Pulse Bot Status");
    }
}
