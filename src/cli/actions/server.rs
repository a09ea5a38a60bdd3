use crate::{
    api,
    cli::telemetry,
    gate::{ConsentGate, GateConfig},
    token::{Keyring, SessionTokens},
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub consent_form_url: Url,
    pub session_token_secret: SecretString,
    pub session_token_kid: String,
    pub previous_session_token_secrets: Vec<(String, SecretString)>,
    pub token_ttl: i64,
    pub skip_if_consented: bool,
    pub enforce_on_resume: bool,
    pub merge_claims_on_denial: bool,
}

impl Args {
    fn gate(self) -> ConsentGate {
        let keys = self.previous_session_token_secrets.into_iter().fold(
            Keyring::new(self.session_token_kid, self.session_token_secret),
            |keys, (kid, secret)| keys.with_previous(kid, secret),
        );

        let config = GateConfig {
            require_existing_consent: self.skip_if_consented,
            enforce_on_resume: self.enforce_on_resume,
            merge_claims_on_denial: self.merge_claims_on_denial,
            ..GateConfig::new(self.consent_form_url)
        };

        ConsentGate::new(config, SessionTokens::new(keys).with_ttl(self.token_ttl))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to bind or serve.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let port = args.port;
    let gate = Arc::new(args.gate());

    let result = api::new(port, gate).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let previous_kids = args
        .previous_session_token_secrets
        .iter()
        .map(|(kid, _)| kid.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("consent_form_url", redact_url(&args.consent_form_url)),
        ("session_token_secret", "REDACTED".to_string()),
        ("session_token_kid", args.session_token_kid.clone()),
        (
            "previous_kids",
            if previous_kids.is_empty() {
                "none".to_string()
            } else {
                previous_kids
            },
        ),
        ("token_ttl", format!("{}s", args.token_ttl)),
        ("skip_if_consented", args.skip_if_consented.to_string()),
        ("enforce_on_resume", args.enforce_on_resume.to_string()),
        (
            "merge_claims_on_denial",
            args.merge_claims_on_denial.to_string(),
        ),
    ];
    info!("{}", format_entries("Startup configuration", &entries));
}

fn redact_url(url: &Url) -> String {
    let mut url = url.clone();
    if url.password().is_some() {
        let _ = url.set_password(Some("REDACTED"));
    }
    url.to_string()
}

fn format_entries(title: &str, entries: &[(&str, String)]) -> String {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    message
}

fn banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const BANNER: &str = r"
   _______
  |  ___  |
  | |   | |
  | |___| |   C O N S E N T   G A T E {VERSION}
  |  ___  |
  | |   | |
  |_|   |_|";
