//! HTTP endpoints for the venue-proof upload step.
//!
//! - `GET  /apply?s=<token>` renders the upload form
//! - `POST /apply?s=<token>` accepts the `venue-proof` file and advances the
//!   open modal via `views.update`
//!
//! Both require a valid signed token in the `s` query parameter. Any failure
//! is logged and collapsed into a 500 with a fixed user-facing message; the
//! user restarts the flow from Slack.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{error, info, warn};

use grantbot_core::{TokenError, TokenSigner, GENERIC_FAILURE_MESSAGE};
use grantbot_slack::blocks::upload_view;
use grantbot_slack::client::{SlackApiError, SlackClient};

#[derive(Clone)]
pub struct ApplyState {
    signer: TokenSigner,
    client: Arc<dyn SlackClient>,
    templates: Arc<Tera>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyQuery {
    /// The signed state token carried across from the upload modal.
    s: String,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("query string rejected: {0}")]
    Query(#[from] QueryRejection),
    #[error("template rendering failed: {0}")]
    Render(#[from] tera::Error),
    #[error(transparent)]
    Api(#[from] SlackApiError),
    #[error("multipart read failed: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("upload did not include a `venue-proof` field")]
    MissingProofField,
    #[error("token has no external_id; the upload modal was never opened")]
    MissingExternalId,
}

impl IntoResponse for ApplyError {
    fn into_response(self) -> Response {
        error!(event_name = "http.apply.failed", error = %self, "apply request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE_MESSAGE).into_response()
    }
}

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(template_error) =
        tera.add_raw_template("apply.html", include_str!("../../../templates/apply.html"))
    {
        warn!(error = %template_error, "failed to register embedded apply template");
    }
    Arc::new(tera)
}

pub fn router(signer: TokenSigner, client: Arc<dyn SlackClient>) -> Router {
    Router::new()
        .route("/apply", get(upload_form).post(submit_proof))
        .with_state(ApplyState { signer, client, templates: init_templates() })
}

async fn upload_form(
    State(state): State<ApplyState>,
    query: Result<Query<ApplyQuery>, QueryRejection>,
) -> Result<Html<String>, ApplyError> {
    let Query(query) = query?;
    let application = state.signer.verify(&query.s)?;

    let mut context = Context::new();
    context.insert("url", &application.url);
    let page = state.templates.render("apply.html", &context)?;

    Ok(Html(page))
}

async fn submit_proof(
    State(state): State<ApplyState>,
    query: Result<Query<ApplyQuery>, QueryRejection>,
    mut multipart: Multipart,
) -> Result<String, ApplyError> {
    let Query(query) = query?;
    let application = state.signer.verify(&query.s)?;
    let external_id =
        application.external_id.as_deref().ok_or(ApplyError::MissingExternalId)?;

    let mut proof_received = false;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("venue-proof") {
            // The upload itself is the proof; content is neither validated
            // nor stored.
            let bytes = field.bytes().await?;
            info!(
                event_name = "http.apply.proof_received",
                external_id,
                size_bytes = bytes.len(),
                "venue proof uploaded"
            );
            proof_received = true;
        }
    }

    if !proof_received {
        return Err(ApplyError::MissingProofField);
    }

    let upload_url = format!("/apply?s={}", query.s);
    state
        .client
        .update_view(external_id, &upload_view(&query.s, external_id, &upload_url, true))
        .await?;

    Ok("yay!".to_owned())
}
