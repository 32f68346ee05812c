use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<RawMessage>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelPage {
    pub channels: Vec<ChannelInfo>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub display_name: String,
}

/// Parameters of one `conversations.history` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub channel: String,
    pub oldest: Option<String>,
    pub latest: Option<String>,
    pub inclusive: bool,
    pub limit: u32,
}

impl HistoryRequest {
    /// A page of the window, strictly between `oldest` and `latest`.
    pub fn page(channel: &str, oldest: &str, latest: &str, limit: u32) -> Self {
        Self {
            channel: channel.to_string(),
            oldest: Some(oldest.to_string()),
            latest: Some(latest.to_string()),
            inclusive: false,
            limit,
        }
    }

    /// Exactly the message posted at `ts`.
    pub fn point(channel: &str, ts: &str) -> Self {
        Self {
            channel: channel.to_string(),
            oldest: None,
            latest: Some(ts.to_string()),
            inclusive: true,
            limit: 1,
        }
    }
}
