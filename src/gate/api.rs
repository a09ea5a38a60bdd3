use crate::gate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use utoipa::ToSchema;

/// Outbound surface of the host login pipeline.
///
/// None of these calls end the login routine by themselves: `deny` only marks
/// the attempt as rejected, and the gate decides whether to keep going.
/// Failures propagate to the host unchanged.
pub trait PostLoginApi {
    /// Suspend the login and send the user to `url` with `query` appended.
    ///
    /// # Errors
    /// Returns an error if the host cannot record the redirect.
    fn send_user_to(&mut self, url: &Url, query: &[(String, String)]) -> Result<(), Error>;

    /// # Errors
    /// Returns an error if the host cannot record the denial.
    fn deny(&mut self, reason: &str) -> Result<(), Error>;

    /// Merge one key into the user's persistent metadata.
    ///
    /// # Errors
    /// Returns an error if the profile store rejects the write.
    fn set_user_metadata(&mut self, key: &str, value: &Value) -> Result<(), Error>;
}

/// Instruction for the host pipeline, in the order the gate issued them.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Redirect {
        url: String,
    },
    Deny {
        reason: String,
    },
    SetUserMetadata {
        key: String,
        #[schema(value_type = Object)]
        value: Value,
    },
}

/// [`PostLoginApi`] that records every call as a [`Command`].
///
/// Used by the HTTP surface, where the host applies the commands itself.
#[derive(Debug, Default)]
pub struct CommandLog {
    commands: Vec<Command>,
}

impl CommandLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    #[must_use]
    pub fn redirects(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Redirect { url } => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn denials(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Deny { reason } => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn metadata_writes(&self) -> Vec<(&str, &Value)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::SetUserMetadata { key, value } => Some((key.as_str(), value)),
                _ => None,
            })
            .collect()
    }
}

impl PostLoginApi for CommandLog {
    fn send_user_to(&mut self, url: &Url, query: &[(String, String)]) -> Result<(), Error> {
        let mut target = url.clone();
        if !query.is_empty() {
            // Parameters set by the gate replace same-named ones already on the URL.
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| !query.iter().any(|(name, _)| name == key))
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            target
                .query_pairs_mut()
                .clear()
                .extend_pairs(&kept)
                .extend_pairs(query);
        }
        self.commands.push(Command::Redirect {
            url: target.to_string(),
        });
        Ok(())
    }

    fn deny(&mut self, reason: &str) -> Result<(), Error> {
        self.commands.push(Command::Deny {
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn set_user_metadata(&mut self, key: &str, value: &Value) -> Result<(), Error> {
        self.commands.push(Command::SetUserMetadata {
            key: key.to_string(),
            value: value.clone(),
        });
        Ok(())
    }
}
