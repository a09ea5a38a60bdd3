//! Signed, time-bound tokens that survive the round trip through the consent form.
//!
//! The gate issues one when it redirects the user away, and the consent form
//! sends one back (signed with the same shared secret) carrying its custom
//! claims under `other`.

mod jwt;
mod keys;

pub use jwt::{
    sign_hs256, verify_hs256, Error, RoundTripClaims, RoundTripHeader, RoundTripPayload,
    ALG_HS256,
};
pub use keys::{parse_key_list, Keyring, DEFAULT_KID};

use std::collections::HashMap;

/// Default expiry window for tokens issued by the gate.
pub const DEFAULT_TOKEN_TTL: i64 = 900; // 15 minutes

/// Query parameter carrying the token in both directions.
pub const SESSION_TOKEN_PARAMETER: &str = "session_token";

#[derive(Debug, Clone)]
pub struct SessionTokens {
    keys: Keyring,
    ttl_seconds: i64,
}

impl SessionTokens {
    #[must_use]
    pub fn new(keys: Keyring) -> Self {
        Self {
            keys,
            ttl_seconds: DEFAULT_TOKEN_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub fn keys(&self) -> &Keyring {
        &self.keys
    }

    /// Sign `payload`, stamping `iat` with `now` and `exp` with `now + ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be encoded.
    pub fn encode(&self, payload: RoundTripPayload, now: i64) -> Result<String, Error> {
        let claims = RoundTripClaims {
            payload,
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
        };
        sign_hs256(&self.keys, &claims)
    }

    /// # Errors
    ///
    /// Returns an error if the token is malformed, forged, or expired.
    pub fn validate(&self, token: &str, now: i64) -> Result<RoundTripClaims, Error> {
        verify_hs256(token, &self.keys, now)
    }

    /// Read the token from the inbound query parameter `name` and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParameter`] when the parameter is absent or empty,
    /// otherwise the same errors as [`SessionTokens::validate`].
    pub fn validate_parameter(
        &self,
        query: &HashMap<String, String>,
        name: &str,
        now: i64,
    ) -> Result<RoundTripClaims, Error> {
        let token = query
            .get(name)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::MissingParameter(name.to_string()))?;
        self.validate(token, now)
    }
}
