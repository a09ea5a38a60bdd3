//! # Consent Gate (Post-Login Terms Enforcement)
//!
//! `consent-gate` plugs into an identity platform's post-login step. It sends
//! users who have not yet accepted the terms of service to an external consent
//! form, then resumes the login when they come back.
//!
//! ## Handshake
//!
//! 1. **Begin:** if the user's stored metadata already holds
//!    `tos_accepted = "yes"` the login proceeds untouched. Otherwise the gate
//!    signs a short-lived `session_token` (`iss = https://{hostname}/`) and
//!    redirects to the consent form with `redirect_uri = https://{hostname}/continue`.
//! 2. **Resume:** the consent form returns a token signed with the same secret,
//!    carrying its answers under the `other` claim. The gate verifies signature
//!    and expiry, denies the login unless `other.tos_accepted == "yes"`, and
//!    writes every returned claim into the user's metadata.
//!
//! Invalid tokens deny with `Error occurred during redirect.`; refused terms deny
//! with `You must accept the terms before continuing`.
//!
//! ## Secrets
//!
//! Tokens are HS256 JWTs carrying a `kid`. The current secret signs; previous
//! secrets stay valid for verification so a rotation does not break logins that
//! are mid-redirect.
//!
//! The host pipeline talks to the gate over HTTP (see [`api`]) and applies the
//! returned commands (`redirect`, `deny`, `set_user_metadata`) itself.

pub mod api;
pub mod cli;
pub mod gate;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
