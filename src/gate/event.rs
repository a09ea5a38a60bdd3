use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;

/// Read-only context of one login attempt, as handed over by the host pipeline.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LoginEvent {
    pub request: LoginRequest,
    #[serde(default)]
    pub user: LoginUser,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    /// Tenant hostname the user is logging in through, e.g. `tenant.example.com`.
    pub hostname: String,
    /// Query parameters of the inbound request; carries `session_token` on resume.
    #[serde(default)]
    pub query: HashMap<String, String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LoginUser {
    #[serde(default)]
    pub user_id: String,
    /// Metadata persisted from prior logins.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub user_metadata: BTreeMap<String, Value>,
}

impl LoginEvent {
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            request: LoginRequest {
                hostname: hostname.into(),
                query: HashMap::new(),
            },
            user: LoginUser::default(),
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user.user_metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_minimal_event() -> Result<(), serde_json::Error> {
        let event: LoginEvent = serde_json::from_value(json!({
            "request": {"hostname": "tenant.example.test"}
        }))?;

        assert_eq!(event, LoginEvent::new("tenant.example.test"));
        Ok(())
    }

    #[test]
    fn deserializes_full_event() -> Result<(), serde_json::Error> {
        let event: LoginEvent = serde_json::from_value(json!({
            "request": {
                "hostname": "tenant.example.test",
                "query": {"session_token": "abc", "state": "xyz"}
            },
            "user": {
                "user_id": "auth0|42",
                "user_metadata": {"tos_accepted": "yes", "visits": 3}
            }
        }))?;

        let expected = LoginEvent::new("tenant.example.test")
            .with_query("session_token", "abc")
            .with_query("state", "xyz")
            .with_user_id("auth0|42")
            .with_metadata("tos_accepted", "yes")
            .with_metadata("visits", 3);
        assert_eq!(event, expected);
        Ok(())
    }

    #[test]
    fn rejects_event_without_hostname() {
        let result = serde_json::from_value::<LoginEvent>(json!({"request": {}}));
        assert!(result.is_err());
    }
}
