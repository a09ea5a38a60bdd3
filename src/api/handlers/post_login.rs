use crate::gate::{
    BeginOutcome, Command, CommandLog, ConsentGate, DenialReason, Error, LoginEvent,
    ResumeOutcome,
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Skipped,
    Redirected,
    Allowed,
    Denied,
}

/// What the host pipeline must do with the login attempt.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    pub commands: Vec<Command>,
}

type ActionResponse = Result<Json<ActionResult>, (StatusCode, String)>;

#[utoipa::path(
    post,
    path = "/v1/post-login",
    request_body = LoginEvent,
    responses (
        (status = 200, description = "Login proceeds or is redirected to the consent form", body = ActionResult),
        (status = 400, description = "Missing or invalid login event", body = String),
        (status = 500, description = "Error issuing the redirect", body = String)
    ),
    tag = "post-login",
)]
#[instrument(skip(gate, payload))]
pub async fn begin(
    Extension(gate): Extension<Arc<ConsentGate>>,
    payload: Result<Json<LoginEvent>, JsonRejection>,
) -> ActionResponse {
    let event = parse_event(payload)?;
    let mut log = CommandLog::new();

    let outcome = gate.begin_or_skip(&event, &mut log).map_err(gate_error)?;
    debug!("post-login outcome: {:?}", outcome);

    let outcome = match outcome {
        BeginOutcome::Skipped => Outcome::Skipped,
        BeginOutcome::Redirected => Outcome::Redirected,
    };

    Ok(Json(ActionResult {
        outcome,
        reason: None,
        commands: log.into_commands(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/post-login/continue",
    request_body = LoginEvent,
    responses (
        (status = 200, description = "Login allowed or denied after the consent form", body = ActionResult),
        (status = 400, description = "Missing or invalid login event", body = String),
        (status = 500, description = "Error recording the result", body = String)
    ),
    tag = "post-login",
)]
#[instrument(skip(gate, payload))]
pub async fn resume(
    Extension(gate): Extension<Arc<ConsentGate>>,
    payload: Result<Json<LoginEvent>, JsonRejection>,
) -> ActionResponse {
    let event = parse_event(payload)?;
    let mut log = CommandLog::new();

    let outcome = gate
        .resume_and_enforce(&event, &mut log)
        .map_err(gate_error)?;
    debug!("continue-post-login outcome: {:?}", outcome);

    let (outcome, reason) = match outcome {
        ResumeOutcome::Allowed => (Outcome::Allowed, None),
        ResumeOutcome::Denied(reason) => (Outcome::Denied, Some(reason)),
    };

    Ok(Json(ActionResult {
        outcome,
        reason,
        commands: log.into_commands(),
    }))
}

fn parse_event(
    payload: Result<Json<LoginEvent>, JsonRejection>,
) -> Result<LoginEvent, (StatusCode, String)> {
    match payload {
        Ok(Json(event)) => Ok(event),
        Err(rejection) => {
            error!("Failed to parse login event: {}", rejection.body_text());
            Err((StatusCode::BAD_REQUEST, rejection.body_text()))
        }
    }
}

fn gate_error(err: Error) -> (StatusCode, String) {
    match err {
        Error::InvalidHostname(_) => {
            debug!("{err}");
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        Error::Token(_) | Error::Api(_) => {
            error!("Consent gate error: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing login event".to_string(),
            )
        }
    }
}
