//! Consent gate for the post-login step.
//!
//! Two entry points form one handshake per login attempt:
//!
//! 1. [`ConsentGate::begin_or_skip`] runs when the login starts. A user whose
//!    stored metadata already says `tos_accepted = "yes"` passes through;
//!    anyone else is sent to the consent form with a signed `session_token`
//!    and a `redirect_uri` pointing back at the tenant's `/continue`.
//! 2. [`ConsentGate::resume_and_enforce`] runs when the user comes back. It
//!    validates the returned token, denies the login unless the form's claims
//!    say `tos_accepted = "yes"`, and merges those claims into the profile.
//!
//! Nothing is kept in memory between the two calls; the host pipeline owns
//! the suspended attempt.

mod api;
mod event;

pub use api::{Command, CommandLog, PostLoginApi};
pub use event::{LoginEvent, LoginRequest, LoginUser};

use crate::token::{self, RoundTripPayload, SessionTokens, SESSION_TOKEN_PARAMETER};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;
use utoipa::ToSchema;

pub const TOS_ACCEPTED_CLAIM: &str = "tos_accepted";
pub const TOS_ACCEPTED_VALUE: &str = "yes";
pub const REDIRECT_URI_PARAMETER: &str = "redirect_uri";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request hostname: {0:?}")]
    InvalidHostname(String),
    #[error("failed to issue session token: {0}")]
    Token(#[from] token::Error),
    #[error("post-login api error: {0}")]
    Api(String),
}

/// Whether a `tos_accepted` value counts as consent. Only the exact string
/// `"yes"` does; `true`, `"YES"` or a missing claim do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Accepted,
    NotAccepted,
}

impl ConsentDecision {
    #[must_use]
    pub fn from_claim(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(answer)) if answer == TOS_ACCEPTED_VALUE => Self::Accepted,
            _ => Self::NotAccepted,
        }
    }

    #[must_use]
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    InvalidToken,
    TermsNotAccepted,
}

impl DenialReason {
    /// User-visible message passed to `deny`.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidToken => "Error occurred during redirect.",
            Self::TermsNotAccepted => "You must accept the terms before continuing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Skipped,
    Redirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Allowed,
    Denied(DenialReason),
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub consent_form_url: Url,
    /// Let users whose stored metadata already holds consent skip the redirect.
    pub require_existing_consent: bool,
    /// Deny the login on resume unless the returned claims hold consent.
    pub enforce_on_resume: bool,
    /// Still merge the returned claims after a terms denial.
    pub merge_claims_on_denial: bool,
}

impl GateConfig {
    #[must_use]
    pub fn new(consent_form_url: Url) -> Self {
        Self {
            consent_form_url,
            require_existing_consent: true,
            enforce_on_resume: true,
            merge_claims_on_denial: false,
        }
    }

    /// Redirect every login and never enforce: the plain round-trip variant.
    #[must_use]
    pub fn ungated(consent_form_url: Url) -> Self {
        Self {
            require_existing_consent: false,
            enforce_on_resume: false,
            ..Self::new(consent_form_url)
        }
    }
}

#[derive(Debug)]
pub struct ConsentGate {
    config: GateConfig,
    tokens: SessionTokens,
}

impl ConsentGate {
    #[must_use]
    pub fn new(config: GateConfig, tokens: SessionTokens) -> Self {
        Self { config, tokens }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Let the login through if consent is on file, otherwise redirect to the consent form.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname is invalid, the token cannot be
    /// signed, or the host rejects the redirect.
    pub fn begin_or_skip<A>(&self, event: &LoginEvent, api: &mut A) -> Result<BeginOutcome, Error>
    where
        A: PostLoginApi + ?Sized,
    {
        self.begin_or_skip_at(event, api, Utc::now().timestamp())
    }

    /// [`ConsentGate::begin_or_skip`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`ConsentGate::begin_or_skip`].
    #[instrument(skip_all, fields(user_id = %event.user.user_id, hostname = %event.request.hostname))]
    pub fn begin_or_skip_at<A>(
        &self,
        event: &LoginEvent,
        api: &mut A,
        now: i64,
    ) -> Result<BeginOutcome, Error>
    where
        A: PostLoginApi + ?Sized,
    {
        let stored = event.user.user_metadata.get(TOS_ACCEPTED_CLAIM);
        if self.config.require_existing_consent && ConsentDecision::from_claim(stored).is_accepted()
        {
            debug!("Terms already accepted, skipping consent form");
            return Ok(BeginOutcome::Skipped);
        }

        let hostname = valid_hostname(&event.request.hostname)?;
        let session_token = self
            .tokens
            .encode(RoundTripPayload::issued_by(format!("https://{hostname}/")), now)?;

        let query = [
            (SESSION_TOKEN_PARAMETER.to_string(), session_token),
            (
                REDIRECT_URI_PARAMETER.to_string(),
                format!("https://{hostname}/continue"),
            ),
        ];
        api.send_user_to(&self.config.consent_form_url, &query)?;

        info!(
            "Redirecting to consent form {}",
            self.config.consent_form_url
        );

        Ok(BeginOutcome::Redirected)
    }

    /// Validate the returned token, enforce consent, and merge the form's claims.
    ///
    /// Token failures never surface as errors: they are logged and turned into
    /// a denial. Only host failures (`deny`, `set_user_metadata`) propagate.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects a denial or a metadata write.
    pub fn resume_and_enforce<A>(
        &self,
        event: &LoginEvent,
        api: &mut A,
    ) -> Result<ResumeOutcome, Error>
    where
        A: PostLoginApi + ?Sized,
    {
        self.resume_and_enforce_at(event, api, Utc::now().timestamp())
    }

    /// [`ConsentGate::resume_and_enforce`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`ConsentGate::resume_and_enforce`].
    #[instrument(skip_all, fields(user_id = %event.user.user_id, hostname = %event.request.hostname))]
    pub fn resume_and_enforce_at<A>(
        &self,
        event: &LoginEvent,
        api: &mut A,
        now: i64,
    ) -> Result<ResumeOutcome, Error>
    where
        A: PostLoginApi + ?Sized,
    {
        let claims = match self.tokens.validate_parameter(
            &event.request.query,
            SESSION_TOKEN_PARAMETER,
            now,
        ) {
            Ok(claims) => claims,
            Err(err) => {
                warn!("Session token rejected: {err}");
                api.deny(DenialReason::InvalidToken.message())?;
                return Ok(ResumeOutcome::Denied(DenialReason::InvalidToken));
            }
        };

        let custom_claims = claims.payload.other;

        let denial = (self.config.enforce_on_resume
            && !ConsentDecision::from_claim(custom_claims.get(TOS_ACCEPTED_CLAIM)).is_accepted())
        .then_some(DenialReason::TermsNotAccepted);

        if let Some(reason) = denial {
            info!("Terms not accepted, denying login");
            api.deny(reason.message())?;
        }

        if denial.is_none() || self.config.merge_claims_on_denial {
            for (key, value) in &custom_claims {
                api.set_user_metadata(key, value)?;
            }
            debug!("Merged {} custom claims into user metadata", custom_claims.len());
        }

        Ok(denial.map_or(ResumeOutcome::Allowed, ResumeOutcome::Denied))
    }
}

/// Hostname as it will appear in `iss` and `redirect_uri`: DNS labels with an optional port.
fn valid_hostname(hostname: &str) -> Result<&str, Error> {
    let valid = Regex::new(
        r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*(?::[0-9]{1,5})?$",
    )
    .map_or(false, |re| re.is_match(hostname));

    if valid {
        Ok(hostname)
    } else {
        Err(Error::InvalidHostname(hostname.to_string()))
    }
}
