use crate::token::jwt::Error;
use secrecy::{ExposeSecret, SecretString};

pub const DEFAULT_KID: &str = "v1";

#[derive(Debug, Clone)]
struct SecretKey {
    kid: String,
    secret: SecretString,
}

/// Shared secrets used to sign and verify round-trip tokens.
///
/// New tokens are always signed with the current key and carry its `kid`.
/// Previous keys only verify, which lets a deployment rotate the secret
/// without failing logins that are mid-redirect.
#[derive(Debug, Clone)]
pub struct Keyring {
    current: SecretKey,
    previous: Vec<SecretKey>,
}

impl Keyring {
    #[must_use]
    pub fn new(kid: impl Into<String>, secret: SecretString) -> Self {
        Self {
            current: SecretKey {
                kid: kid.into(),
                secret,
            },
            previous: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_previous(mut self, kid: impl Into<String>, secret: SecretString) -> Self {
        self.previous.push(SecretKey {
            kid: kid.into(),
            secret,
        });
        self
    }

    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.current.kid
    }

    #[must_use]
    pub fn previous_kids(&self) -> Vec<&str> {
        self.previous.iter().map(|key| key.kid.as_str()).collect()
    }

    pub(crate) fn signing_key(&self) -> (&str, &[u8]) {
        (
            &self.current.kid,
            self.current.secret.expose_secret().as_bytes(),
        )
    }

    /// Tokens without a `kid` predate rotation and are checked against the current key.
    pub(crate) fn verification_key(&self, kid: Option<&str>) -> Result<&[u8], Error> {
        let Some(kid) = kid else {
            return Ok(self.current.secret.expose_secret().as_bytes());
        };

        std::iter::once(&self.current)
            .chain(self.previous.iter())
            .find(|key| key.kid == kid)
            .map(|key| key.secret.expose_secret().as_bytes())
            .ok_or_else(|| Error::UnknownKid(kid.to_string()))
    }
}

/// Parse a `kid=secret,kid=secret` list of verification-only keys.
///
/// # Errors
///
/// Returns an error string with the position of the first entry missing a `kid` or secret.
pub fn parse_key_list(list: &str) -> Result<Vec<(String, SecretString)>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(index, entry)| {
            // Entries may be bare secrets; never echo them back.
            let (kid, secret) = entry
                .split_once('=')
                .ok_or_else(|| format!("invalid key entry #{}, expected kid=secret", index + 1))?;
            let (kid, secret) = (kid.trim(), secret.trim());
            if kid.is_empty() || secret.is_empty() {
                return Err(format!(
                    "invalid key entry #{}, expected kid=secret",
                    index + 1
                ));
            }
            Ok((kid.to_string(), SecretString::from(secret)))
        })
        .collect()
}
