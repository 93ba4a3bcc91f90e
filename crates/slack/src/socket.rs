//! Socket Mode ingress.
//!
//! Slack pushes envelopes over a websocket; the runner acks each one and
//! hands it to the dispatcher. Transport drops trigger reconnects with
//! capped exponential backoff, and once the retries run out the runner
//! stops quietly so the upload endpoint keeps serving.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("could not receive envelope: {0}")]
    Receive(String),
    #[error("could not acknowledge envelope: {0}")]
    Acknowledge(String),
    #[error("could not disconnect cleanly: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let scaled = self.base_delay_ms.saturating_mul(1 << shift);
        Duration::from_millis(scaled.min(self.max_delay_ms))
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that never yields an envelope. Lets the process run with the
/// upload endpoint alone, or stand in where no websocket is wanted.
#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    warn!(
                        event_name = "socket.transport.dropped",
                        attempt,
                        error = %error,
                        "socket transport dropped"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "socket.transport.gave_up",
                            retries = self.reconnect_policy.max_retries,
                            "socket retries exhausted; no more events, upload endpoint stays up"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.delay_before(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn pump(&self, attempt: u32) -> Result<(), TransportError> {
        self.transport.connect().await?;
        info!(event_name = "socket.connected", attempt, "socket transport connected");

        while let Some(envelope) = self.transport.next_envelope().await? {
            self.process(envelope).await;
        }

        info!(event_name = "socket.closed", attempt, "socket stream ended");
        self.transport.disconnect().await
    }

    async fn process(&self, envelope: SlackEnvelope) {
        let (channel_id, user_id) = event_origin(&envelope.event);
        debug!(
            event_name = "socket.envelope.received",
            correlation_id = %envelope.envelope_id,
            event_type = ?envelope.event.event_type(),
            channel_id = channel_id.as_deref().unwrap_or("-"),
            user_id = user_id.as_deref().unwrap_or("-"),
            "envelope received"
        );

        // Ack before handling; slack redelivers anything left unacked.
        if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
            warn!(
                event_name = "socket.envelope.ack_failed",
                correlation_id = %envelope.envelope_id,
                error = %error,
                "could not ack envelope"
            );
        }

        let ctx = EventContext { correlation_id: envelope.envelope_id.clone() };
        if let Err(error) = self.dispatcher.dispatch(&envelope, &ctx).await {
            warn!(
                event_name = "socket.dispatch.failed",
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.as_deref().unwrap_or("-"),
                user_id = user_id.as_deref().unwrap_or("-"),
                error = %error,
                "event handler failed; continuing with the next envelope"
            );
        }
    }
}

fn event_origin(event: &SlackEvent) -> (Option<String>, Option<String>) {
    match event {
        SlackEvent::ChannelMessage(message) => {
            (Some(message.channel_id.clone()), Some(message.user_id.clone()))
        }
        SlackEvent::BlockAction(action) => {
            (Some(action.channel_id.clone()), Some(action.user_id.clone()))
        }
        SlackEvent::ViewSubmission(view) => (None, Some(view.user_id.clone())),
        SlackEvent::Unsupported { .. } => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use grantbot_core::TokenSigner;

    use super::{ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::client::{RecordingSlackClient, SlackCall};
    use crate::events::{
        EventDispatcher, MessageEvent, MessageHandler, SlackEnvelope, SlackEvent,
    };
    use crate::flow::ApplicationFlow;

    struct FakeSocket {
        inner: Mutex<FakeSocketState>,
    }

    #[derive(Default)]
    struct FakeSocketState {
        connect_failures: VecDeque<TransportError>,
        pending: VecDeque<SlackEnvelope>,
        connects: usize,
        acked: Vec<String>,
    }

    impl FakeSocket {
        fn new(connect_failures: Vec<TransportError>, pending: Vec<SlackEnvelope>) -> Self {
            Self {
                inner: Mutex::new(FakeSocketState {
                    connect_failures: connect_failures.into(),
                    pending: pending.into(),
                    ..FakeSocketState::default()
                }),
            }
        }

        async fn connects(&self) -> usize {
            self.inner.lock().await.connects
        }

        async fn acked(&self) -> Vec<String> {
            self.inner.lock().await.acked.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for FakeSocket {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut inner = self.inner.lock().await;
            inner.connects += 1;
            match inner.connect_failures.pop_front() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            Ok(self.inner.lock().await.pending.pop_front())
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            self.inner.lock().await.acked.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn grants_message(envelope_id: &str, text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::ChannelMessage(MessageEvent {
                channel_id: "C0GRANTS".to_owned(),
                user_id: "U1".to_owned(),
                text: text.to_owned(),
                ts: "1730000000.1000".to_owned(),
                thread_ts: None,
                subtype: None,
            }),
        }
    }

    fn flow_dispatcher(client: Arc<RecordingSlackClient>) -> EventDispatcher {
        let flow = ApplicationFlow::new(
            client,
            TokenSigner::new("test-secret".to_owned().into()),
            "C0GRANTS",
            None,
        );
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(MessageHandler::new(flow));
        dispatcher
    }

    #[tokio::test]
    async fn envelopes_are_acked_and_reach_the_application_flow() {
        let client = Arc::new(RecordingSlackClient::new());
        let transport = Arc::new(FakeSocket::new(
            vec![],
            vec![grants_message("env-1", "https://hackfoo.dev")],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            flow_dispatcher(client.clone()),
            ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
        );
        runner.start().await.expect("runner");

        assert_eq!(transport.acked().await, vec!["env-1"]);
        let calls = client.calls().await;
        assert!(
            matches!(&calls[0], SlackCall::PostMessage { channel, .. } if channel == "C0GRANTS"),
            "detected url should produce the threaded apply prompt, got {calls:?}"
        );
    }

    #[tokio::test]
    async fn runner_reconnects_after_a_dropped_connection() {
        let transport = Arc::new(FakeSocket::new(
            vec![TransportError::Connect("dns failure".to_owned())],
            vec![grants_message("env-2", "hello")],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::new(),
            ReconnectPolicy { max_retries: 1, base_delay_ms: 0, max_delay_ms: 0 },
        );
        runner.start().await.expect("runner");

        assert_eq!(transport.connects().await, 2);
        assert_eq!(transport.acked().await, vec!["env-2"]);
    }

    #[tokio::test]
    async fn runner_gives_up_quietly_when_retries_run_out() {
        let transport = Arc::new(FakeSocket::new(
            vec![
                TransportError::Connect("down".to_owned()),
                TransportError::Connect("still down".to_owned()),
                TransportError::Connect("very down".to_owned()),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::new(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("exhausted retries must not error");
        assert_eq!(transport.connects().await, 3);
    }

    #[test]
    fn reconnect_delay_grows_and_caps() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 400 };

        assert_eq!(policy.delay_before(0).as_millis(), 100);
        assert_eq!(policy.delay_before(1).as_millis(), 200);
        assert_eq!(policy.delay_before(5).as_millis(), 400);
    }

    #[test]
    fn event_origin_names_the_channel_and_poster() {
        let envelope = grants_message("env-3", "https://hackfoo.dev");

        let (channel_id, user_id) = super::event_origin(&envelope.event);
        assert_eq!(channel_id.as_deref(), Some("C0GRANTS"));
        assert_eq!(user_id.as_deref(), Some("U1"));
    }
}
