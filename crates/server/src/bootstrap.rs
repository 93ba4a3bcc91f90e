use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tracing::info;

use grantbot_core::config::{AppConfig, ConfigError, LoadOptions};
use grantbot_core::TokenSigner;
use grantbot_slack::client::HttpSlackClient;
use grantbot_slack::events::{
    BlockActionHandler, EventDispatcher, MessageHandler, ViewSubmissionHandler,
};
use grantbot_slack::flow::ApplicationFlow;
use grantbot_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};

use crate::{apply, health};

pub struct Application {
    pub config: AppConfig,
    pub router: Router,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let client = Arc::new(HttpSlackClient::new(config.slack.bot_token.clone()));
    let signer = TokenSigner::new(config.slack.signing_secret.clone());

    let flow = ApplicationFlow::new(
        client.clone(),
        signer.clone(),
        &config.channel.grants_channel,
        config.server.public_base_url.clone(),
    );

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(flow.clone()));
    dispatcher.register(BlockActionHandler::new(flow.clone()));
    dispatcher.register(ViewSubmissionHandler::new(flow));
    info!(
        event_name = "system.bootstrap.handlers_registered",
        correlation_id = "bootstrap",
        handler_count = dispatcher.handler_count(),
        "slack event handlers registered"
    );

    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        dispatcher,
        ReconnectPolicy::default(),
    );

    let router = apply::router(signer, client).merge(health::router());

    Ok(Application { config, router, slack_runner })
}

#[cfg(test)]
mod tests {
    use grantbot_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("xoxb-test".to_string()),
                signing_secret: Some("test-signing-secret".to_string()),
                grants_channel: Some("C0GRANTS".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_with_a_malformed_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("invalid-token".to_string()),
                signing_secret: Some("test-signing-secret".to_string()),
                grants_channel: Some("C0GRANTS".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_the_full_application() {
        let app = bootstrap(valid_overrides())
            .await
            .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.config.channel.grants_channel, "C0GRANTS");
        assert_eq!(app.config.server.port, 3000);
    }
}
