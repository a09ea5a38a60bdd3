use anyhow::{anyhow, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chrono::Utc;
use consent_gate::{
    api::router,
    gate::{ConsentGate, GateConfig, LoginEvent},
    token::{Keyring, RoundTripPayload, SessionTokens, SESSION_TOKEN_PARAMETER},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

const SECRET: &str = "this-is-a-very-secret-token";
const HOSTNAME: &str = "tenant.example.test";

fn tokens() -> SessionTokens {
    SessionTokens::new(Keyring::new("v1", SecretString::from(SECRET)))
}

fn app(config: GateConfig) -> Router {
    router(Arc::new(ConsentGate::new(config, tokens())))
}

fn form_url() -> Result<Url> {
    Ok(Url::parse("https://consent.example.test/terms")?)
}

async fn post(app: &Router, uri: &str, event: &LoginEvent) -> Result<(StatusCode, Value)> {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(event)?))?,
        )
        .await?;

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&body)?))
}

/// Stand-in for the consent form: read the handed-over token and sign the answer.
fn consent_form(redirect: &str, answer: &str) -> Result<(String, String)> {
    let redirect = Url::parse(redirect)?;
    let query = |name: &str| {
        redirect
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| anyhow!("missing {name} in redirect"))
    };

    let now = Utc::now().timestamp();
    let received = tokens().validate(&query(SESSION_TOKEN_PARAMETER)?, now)?;
    assert_eq!(received.payload.iss, format!("https://{HOSTNAME}/"));

    let answer = tokens().encode(
        RoundTripPayload::issued_by(received.payload.iss)
            .with_claim("tos_accepted", answer)
            .with_claim("newsletter", "weekly"),
        now,
    )?;
    Ok((query("redirect_uri")?, answer))
}

#[tokio::test]
async fn accepted_terms_resume_the_login() -> Result<()> {
    let app = app(GateConfig::new(form_url()?));
    let event = LoginEvent::new(HOSTNAME).with_user_id("auth0|42");

    let (status, begin) = post(&app, "/v1/post-login", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(begin["outcome"], "redirected");
    assert_eq!(begin["commands"][0]["type"], "redirect");

    let redirect = begin["commands"][0]["url"]
        .as_str()
        .ok_or_else(|| anyhow!("redirect url is not a string"))?;
    assert!(redirect.starts_with("https://consent.example.test/terms?"));

    let (redirect_uri, answer) = consent_form(redirect, "yes")?;
    assert_eq!(redirect_uri, format!("https://{HOSTNAME}/continue"));

    let event = event.with_query(SESSION_TOKEN_PARAMETER, answer);
    let (status, resume) = post(&app, "/v1/post-login/continue", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resume["outcome"], "allowed");
    assert!(resume.get("reason").is_none());

    let writes: Vec<(&str, &Value)> = resume["commands"]
        .as_array()
        .map(|commands| {
            commands
                .iter()
                .filter(|command| command["type"] == "set_user_metadata")
                .filter_map(|command| Some((command["key"].as_str()?, &command["value"])))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(writes.len(), 2);
    assert!(writes.contains(&("tos_accepted", &json!("yes"))));
    assert!(writes.contains(&("newsletter", &json!("weekly"))));
    Ok(())
}

#[tokio::test]
async fn refused_terms_deny_the_login() -> Result<()> {
    let app = app(GateConfig::new(form_url()?));
    let event = LoginEvent::new(HOSTNAME);

    let (_, begin) = post(&app, "/v1/post-login", &event).await?;
    let redirect = begin["commands"][0]["url"]
        .as_str()
        .ok_or_else(|| anyhow!("redirect url is not a string"))?;
    let (_, answer) = consent_form(redirect, "no")?;

    let event = event.with_query(SESSION_TOKEN_PARAMETER, answer);
    let (status, resume) = post(&app, "/v1/post-login/continue", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resume["outcome"], "denied");
    assert_eq!(resume["reason"], "terms_not_accepted");
    assert_eq!(
        resume["commands"],
        json!([{
            "type": "deny",
            "reason": "You must accept the terms before continuing"
        }])
    );
    Ok(())
}

#[tokio::test]
async fn forged_token_is_denied() -> Result<()> {
    let app = app(GateConfig::new(form_url()?));
    let forged = SessionTokens::new(Keyring::new("v1", SecretString::from("not-the-secret")))
        .encode(
            RoundTripPayload::issued_by(format!("https://{HOSTNAME}/"))
                .with_claim("tos_accepted", "yes"),
            Utc::now().timestamp(),
        )?;

    let event = LoginEvent::new(HOSTNAME).with_query(SESSION_TOKEN_PARAMETER, forged);
    let (status, resume) = post(&app, "/v1/post-login/continue", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resume["outcome"], "denied");
    assert_eq!(resume["reason"], "invalid_token");
    assert_eq!(
        resume["commands"],
        json!([{ "type": "deny", "reason": "Error occurred during redirect." }])
    );
    Ok(())
}

#[tokio::test]
async fn returning_user_skips_the_form() -> Result<()> {
    let app = app(GateConfig::new(form_url()?));
    let event = LoginEvent::new(HOSTNAME).with_metadata("tos_accepted", "yes");

    let (status, begin) = post(&app, "/v1/post-login", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(begin["outcome"], "skipped");
    assert_eq!(begin["commands"], json!([]));
    Ok(())
}

#[tokio::test]
async fn ungated_variant_always_redirects_and_merges() -> Result<()> {
    let app = app(GateConfig::ungated(form_url()?));
    let event = LoginEvent::new(HOSTNAME).with_metadata("tos_accepted", "yes");

    let (_, begin) = post(&app, "/v1/post-login", &event).await?;
    assert_eq!(begin["outcome"], "redirected");

    let redirect = begin["commands"][0]["url"]
        .as_str()
        .ok_or_else(|| anyhow!("redirect url is not a string"))?;
    let (_, answer) = consent_form(redirect, "no")?;

    let event = event.with_query(SESSION_TOKEN_PARAMETER, answer);
    let (_, resume) = post(&app, "/v1/post-login/continue", &event).await?;
    assert_eq!(resume["outcome"], "allowed");
    assert_eq!(resume["commands"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn invalid_hostname_is_bad_request() -> Result<()> {
    let app = app(GateConfig::new(form_url()?));
    let event = LoginEvent::new("evil.test/phish?x=");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/post-login")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&event)?))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
