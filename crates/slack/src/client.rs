//! Outbound Slack Web API calls.
//!
//! Handlers depend on the [`SlackClient`] trait so the flow can be exercised
//! without a network; [`HttpSlackClient`] is the real thing and
//! [`RecordingSlackClient`] captures calls for assertions.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::blocks::{MessageTemplate, ModalView};

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack api transport failure: {0}")]
    Transport(String),
    #[error("slack api `{method}` returned error `{error}`")]
    Api { method: String, error: String },
}

#[async_trait]
pub trait SlackClient: Send + Sync {
    /// Post a message; returns the timestamp Slack assigned to it.
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<String, SlackApiError>;

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), SlackApiError>;

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError>;

    async fn remove_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError>;

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError>;

    /// Push a view onto an already-open modal stack.
    async fn push_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError>;

    /// Re-render an open modal addressed by its `external_id`.
    async fn update_view(&self, external_id: &str, view: &ModalView) -> Result<(), SlackApiError>;
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

pub fn message_payload(channel: &str, thread_ts: Option<&str>, message: &MessageTemplate) -> Value {
    let mut payload = json!({
        "channel": channel,
        "text": message.fallback_text,
        "blocks": message.blocks,
    });
    if let Some(thread_ts) = thread_ts {
        payload["thread_ts"] = json!(thread_ts);
    }
    payload
}

pub fn ephemeral_payload(channel: &str, user: &str, text: &str) -> Value {
    json!({ "channel": channel, "user": user, "text": text })
}

pub fn reaction_payload(channel: &str, timestamp: &str, name: &str) -> Value {
    json!({ "channel": channel, "timestamp": timestamp, "name": name })
}

pub fn update_message_payload(channel: &str, ts: &str, message: &MessageTemplate) -> Value {
    json!({
        "channel": channel,
        "ts": ts,
        "text": message.fallback_text,
        "blocks": message.blocks,
    })
}

pub fn trigger_view_payload(trigger_id: &str, view: &ModalView) -> Value {
    json!({ "trigger_id": trigger_id, "view": view })
}

pub fn external_view_payload(external_id: &str, view: &ModalView) -> Value {
    json!({ "external_id": external_id, "view": view })
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpSlackClient {
    http: reqwest::Client,
    bot_token: SecretString,
    base_url: String,
}

impl HttpSlackClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, SLACK_API_BASE_URL)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), bot_token, base_url: base_url.into() }
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value, SlackApiError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error =
                body.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
            return Err(SlackApiError::Api { method: method.to_owned(), error });
        }

        Ok(body)
    }
}

#[async_trait]
impl SlackClient for HttpSlackClient {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<String, SlackApiError> {
        let body =
            self.call("chat.postMessage", message_payload(channel, thread_ts, message)).await?;
        Ok(body.get("ts").and_then(Value::as_str).unwrap_or_default().to_owned())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        self.call("chat.postEphemeral", ephemeral_payload(channel, user, text)).await?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.call("reactions.add", reaction_payload(channel, timestamp, name)).await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.call("reactions.remove", reaction_payload(channel, timestamp, name)).await?;
        Ok(())
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.call("chat.update", update_message_payload(channel, ts, message)).await?;
        Ok(())
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.call("views.open", trigger_view_payload(trigger_id, view)).await?;
        Ok(())
    }

    async fn push_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.call("views.push", trigger_view_payload(trigger_id, view)).await?;
        Ok(())
    }

    async fn update_view(&self, external_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.call("views.update", external_view_payload(external_id, view)).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording test double
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum SlackCall {
    PostMessage { channel: String, thread_ts: Option<String>, message: MessageTemplate },
    PostEphemeral { channel: String, user: String, text: String },
    AddReaction { channel: String, timestamp: String, name: String },
    RemoveReaction { channel: String, timestamp: String, name: String },
    UpdateMessage { channel: String, ts: String, message: MessageTemplate },
    OpenView { trigger_id: String, view: ModalView },
    PushView { trigger_id: String, view: ModalView },
    UpdateView { external_id: String, view: ModalView },
}

/// Captures every outbound call instead of talking to Slack.
#[derive(Default)]
pub struct RecordingSlackClient {
    calls: Mutex<Vec<SlackCall>>,
}

impl RecordingSlackClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<SlackCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: SlackCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl SlackClient for RecordingSlackClient {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<String, SlackApiError> {
        self.record(SlackCall::PostMessage {
            channel: channel.to_owned(),
            thread_ts: thread_ts.map(str::to_owned),
            message: message.clone(),
        })
        .await;
        Ok(format!("1730000000.{:04}", self.calls.lock().await.len()))
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        self.record(SlackCall::PostEphemeral {
            channel: channel.to_owned(),
            user: user.to_owned(),
            text: text.to_owned(),
        })
        .await;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.record(SlackCall::AddReaction {
            channel: channel.to_owned(),
            timestamp: timestamp.to_owned(),
            name: name.to_owned(),
        })
        .await;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.record(SlackCall::RemoveReaction {
            channel: channel.to_owned(),
            timestamp: timestamp.to_owned(),
            name: name.to_owned(),
        })
        .await;
        Ok(())
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.record(SlackCall::UpdateMessage {
            channel: channel.to_owned(),
            ts: ts.to_owned(),
            message: message.clone(),
        })
        .await;
        Ok(())
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.record(SlackCall::OpenView { trigger_id: trigger_id.to_owned(), view: view.clone() })
            .await;
        Ok(())
    }

    async fn push_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.record(SlackCall::PushView { trigger_id: trigger_id.to_owned(), view: view.clone() })
            .await;
        Ok(())
    }

    async fn update_view(&self, external_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.record(SlackCall::UpdateView {
            external_id: external_id.to_owned(),
            view: view.clone(),
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ephemeral_payload, external_view_payload, message_payload, reaction_payload,
        trigger_view_payload, update_message_payload,
    };
    use crate::blocks::{apply_prompt_message, upload_view};

    #[test]
    fn message_payload_includes_thread_ts_only_when_threaded() {
        let message = apply_prompt_message("U1", "tok");

        let threaded = message_payload("C1", Some("1730000000.1000"), &message);
        assert_eq!(threaded["channel"], "C1");
        assert_eq!(threaded["thread_ts"], "1730000000.1000");
        assert_eq!(threaded["text"], "<@U1> over here!");
        assert!(threaded["blocks"].is_array());

        let top_level = message_payload("C1", None, &message);
        assert!(top_level.get("thread_ts").is_none());
    }

    #[test]
    fn reaction_and_ephemeral_payloads_match_the_wire_shape() {
        let reaction = reaction_payload("C1", "1730000000.1000", "hyper-dino-wave");
        assert_eq!(reaction["name"], "hyper-dino-wave");
        assert_eq!(reaction["timestamp"], "1730000000.1000");

        let ephemeral = ephemeral_payload("C1", "U1", "hint");
        assert_eq!(ephemeral["user"], "U1");
        assert_eq!(ephemeral["text"], "hint");
    }

    #[test]
    fn view_payloads_address_by_trigger_or_external_id() {
        let view = upload_view("tok", "corr-1", "/apply?s=tok", false);

        let opened = trigger_view_payload("trig-1", &view);
        assert_eq!(opened["trigger_id"], "trig-1");
        assert_eq!(opened["view"]["type"], "modal");
        assert_eq!(opened["view"]["external_id"], "corr-1");

        let updated = external_view_payload("corr-1", &view);
        assert_eq!(updated["external_id"], "corr-1");
        assert_eq!(updated["view"]["callback_id"], "apply2");
    }

    #[test]
    fn update_message_payload_targets_the_existing_ts() {
        let message = crate::blocks::submitted_message();
        let payload = update_message_payload("C1", "1730000000.2000", &message);

        assert_eq!(payload["ts"], "1730000000.2000");
        assert_eq!(payload["text"], crate::blocks::SUBMITTED_TEXT);
    }
}
