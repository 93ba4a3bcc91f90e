use serde::{Deserialize, Serialize};

/// Progress record for one in-flight application.
///
/// Never persisted: the signed token minted at each step is the only copy.
/// Fields accumulate as the flow advances; a new token is minted after each
/// addition and the previous one is simply abandoned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    /// Hackathon website URL detected in the channel message.
    pub url: String,
    /// Slack user id of the poster. Interactions from anyone else are ignored.
    pub user: String,
    /// Timestamp of the original channel message carrying the URL.
    pub original_ts: String,
    /// Timestamp of the bot's threaded status message, captured at button click.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Correlation id minted at the first modal submission; lets the upload
    /// endpoint address the open modal via `views.update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl ApplicationState {
    /// State for a freshly detected URL, before any interaction.
    pub fn detected(
        url: impl Into<String>,
        user: impl Into<String>,
        original_ts: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            original_ts: original_ts.into(),
            ts: None,
            external_id: None,
        }
    }

    pub fn with_status_ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Whether the interacting user is the one this application belongs to.
    pub fn issued_to(&self, user_id: &str) -> bool {
        self.user == user_id
    }
}
