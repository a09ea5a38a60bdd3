use crate::{
    cli::actions::{server::Args, Action},
    token::{parse_key_list, DEFAULT_KID, DEFAULT_TOKEN_TTL},
};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let consent_form_url = matches
        .get_one::<Url>("consent-form-url")
        .cloned()
        .context("missing required argument: --consent-form-url")?;

    let session_token_secret = matches
        .get_one::<String>("session-token-secret")
        .map(|secret| SecretString::from(secret.as_str()))
        .context("missing required argument: --session-token-secret")?;
    if session_token_secret.expose_secret().trim().is_empty() {
        return Err(anyhow!("session token secret must not be empty"));
    }

    let session_token_kid = matches
        .get_one::<String>("session-token-kid")
        .cloned()
        .unwrap_or_else(|| DEFAULT_KID.to_string());

    let previous_session_token_secrets = matches
        .get_one::<String>("previous-session-token-secrets")
        .map(|list| parse_key_list(list).map_err(|e| anyhow!(e)))
        .transpose()
        .context("invalid CONSENT_GATE_PREVIOUS_SESSION_TOKEN_SECRETS")?
        .unwrap_or_default();

    if previous_session_token_secrets
        .iter()
        .any(|(kid, _)| *kid == session_token_kid)
    {
        return Err(anyhow!(
            "previous session token kid '{session_token_kid}' clashes with the current kid"
        ));
    }

    let token_ttl = matches
        .get_one::<i64>("token-ttl")
        .copied()
        .unwrap_or(DEFAULT_TOKEN_TTL);

    let flag = |name: &str, default: bool| {
        matches
            .get_one::<bool>(name)
            .copied()
            .unwrap_or(default)
    };

    Ok(Action::Server(Args {
        port,
        consent_form_url,
        session_token_secret,
        session_token_kid,
        previous_session_token_secrets,
        token_ttl,
        skip_if_consented: flag("skip-if-consented", true),
        enforce_on_resume: flag("enforce-on-resume", true),
        merge_claims_on_denial: flag("merge-claims-on-denial", false),
    }))
}
