//! The application flow: detect a link, confirm it, collect venue proof,
//! submit.
//!
//! Each step verifies the token it was handed, adds whatever the step
//! learned, and mints a fresh token for the next step. Verification failures
//! and user mismatches are terminal for the interaction: the bot logs them
//! and does nothing user-visible.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use grantbot_core::{
    extract_url, ApplicationState, InteractionError, TokenError, TokenSigner,
};

use crate::blocks::{apply_prompt_message, apply_view, no_url_hint, submitted_message, upload_view};
use crate::client::SlackClient;
use crate::events::{
    BlockActionEvent, BlockActionService, EventContext, EventHandlerError, HandlerResult,
    MessageEvent, MessageService, ViewSubmissionEvent, ViewSubmissionService,
};

/// Reaction added to the original message while an application is in flight.
pub const IN_PROGRESS_REACTION: &str = "hyper-dino-wave";
/// Reaction for messages the bot could not find a URL in.
pub const CONFUSED_REACTION: &str = "confused-dino";
/// Reaction added once the application has been submitted.
pub const SUBMITTED_REACTION: &str = "large_orange_circle";

pub const APPLY_ACTION_ID: &str = "apply";
pub const APPLY_VIEW_CALLBACK: &str = "apply";
pub const SUBMIT_VIEW_CALLBACK: &str = "apply2";

#[derive(Clone)]
pub struct ApplicationFlow {
    client: Arc<dyn SlackClient>,
    signer: TokenSigner,
    grants_channel: String,
    public_base_url: Option<String>,
}

impl ApplicationFlow {
    pub fn new(
        client: Arc<dyn SlackClient>,
        signer: TokenSigner,
        grants_channel: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        Self { client, signer, grants_channel: grants_channel.into(), public_base_url }
    }

    fn upload_url(&self, token: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/apply?s={token}", base.trim_end_matches('/')),
            None => format!("/apply?s={token}"),
        }
    }

    /// Verify a carried token, classifying failures for the caller to log.
    fn recover_state(&self, token: &str) -> Result<ApplicationState, InteractionError> {
        Ok(self.signer.verify(token)?)
    }

    fn reject(error: &InteractionError, step: &str, ctx: &EventContext) -> HandlerResult {
        if error.is_silent() {
            debug!(
                event_name = "flow.interaction.ignored",
                correlation_id = %ctx.correlation_id,
                step,
                error = %error,
                "silently ignoring interaction"
            );
        } else {
            warn!(
                event_name = "flow.interaction.rejected",
                correlation_id = %ctx.correlation_id,
                step,
                error = %error,
                "rejecting interaction with unusable token"
            );
        }
        HandlerResult::Ignored
    }

    fn sign_or_reject(
        &self,
        state: &ApplicationState,
        step: &str,
        ctx: &EventContext,
    ) -> Result<String, HandlerResult> {
        self.signer.sign(state).map_err(|error: TokenError| {
            warn!(
                event_name = "flow.token.sign_failed",
                correlation_id = %ctx.correlation_id,
                step,
                error = %error,
                "could not mint token for next step"
            );
            HandlerResult::Ignored
        })
    }
}

#[async_trait]
impl MessageService for ApplicationFlow {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if event.channel_id != self.grants_channel
            || event.subtype.is_some()
            || event.thread_ts.is_some()
        {
            return Ok(HandlerResult::Ignored);
        }

        let Some(url) = extract_url(&event.text) else {
            self.client
                .add_reaction(&event.channel_id, &event.ts, CONFUSED_REACTION)
                .await?;
            self.client.post_ephemeral(&event.channel_id, &event.user_id, no_url_hint()).await?;
            return Ok(HandlerResult::Processed);
        };

        let state = ApplicationState::detected(url, &event.user_id, &event.ts);
        let token = match self.sign_or_reject(&state, "detect", ctx) {
            Ok(token) => token,
            Err(result) => return Ok(result),
        };

        self.client
            .post_message(
                &event.channel_id,
                Some(&event.ts),
                &apply_prompt_message(&event.user_id, &token),
            )
            .await?;
        self.client.add_reaction(&event.channel_id, &event.ts, IN_PROGRESS_REACTION).await?;

        info!(
            event_name = "flow.application.detected",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            user_id = %event.user_id,
            url,
            "hackathon url detected; apply prompt posted"
        );
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl BlockActionService for ApplicationFlow {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if event.action_id != APPLY_ACTION_ID {
            return Ok(HandlerResult::Ignored);
        }

        let Some(token) = event.value.as_deref() else {
            return Ok(Self::reject(
                &InteractionError::Token(TokenError::Malformed("missing button value".to_owned())),
                "apply-click",
                ctx,
            ));
        };

        let state = match self.recover_state(token) {
            Ok(state) => state,
            Err(error) => return Ok(Self::reject(&error, "apply-click", ctx)),
        };

        if !state.issued_to(&event.user_id) {
            let error = InteractionError::mismatch(&state.user, &event.user_id);
            return Ok(Self::reject(&error, "apply-click", ctx));
        }

        // The prompt message's ts is what the final step edits.
        let state = state.with_status_ts(&event.message_ts);
        let token = match self.sign_or_reject(&state, "apply-click", ctx) {
            Ok(token) => token,
            Err(result) => return Ok(result),
        };

        self.client.open_view(&event.trigger_id, &apply_view(&state.url, &token)).await?;

        info!(
            event_name = "flow.application.modal_opened",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            "apply modal opened"
        );
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl ViewSubmissionService for ApplicationFlow {
    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let state = match self.recover_state(&event.private_metadata) {
            Ok(state) => state,
            Err(error) => return Ok(Self::reject(&error, "view-submit", ctx)),
        };

        match event.callback_id.as_str() {
            APPLY_VIEW_CALLBACK => {
                let external_id = Uuid::new_v4().to_string();
                let state = state.with_external_id(&external_id);
                let token = match self.sign_or_reject(&state, "confirm", ctx) {
                    Ok(token) => token,
                    Err(result) => return Ok(result),
                };

                let upload_url = self.upload_url(&token);
                self.client
                    .push_view(
                        &event.trigger_id,
                        &upload_view(&token, &external_id, &upload_url, false),
                    )
                    .await?;

                info!(
                    event_name = "flow.application.upload_requested",
                    correlation_id = %ctx.correlation_id,
                    external_id = %external_id,
                    "upload view pushed"
                );
                Ok(HandlerResult::Processed)
            }
            SUBMIT_VIEW_CALLBACK => {
                let Some(status_ts) = state.ts.as_deref() else {
                    warn!(
                        event_name = "flow.application.missing_status_ts",
                        correlation_id = %ctx.correlation_id,
                        "final submission token has no status message ts"
                    );
                    return Ok(HandlerResult::Ignored);
                };

                self.client
                    .update_message(&self.grants_channel, status_ts, &submitted_message())
                    .await?;
                self.client
                    .add_reaction(&self.grants_channel, &state.original_ts, SUBMITTED_REACTION)
                    .await?;
                self.client
                    .remove_reaction(&self.grants_channel, &state.original_ts, IN_PROGRESS_REACTION)
                    .await?;

                // No further token is issued; the application is done.
                info!(
                    event_name = "flow.application.submitted",
                    correlation_id = %ctx.correlation_id,
                    user_id = %state.user,
                    url = %state.url,
                    "application submitted"
                );
                Ok(HandlerResult::Processed)
            }
            _ => Ok(HandlerResult::Ignored),
        }
    }
}
