//! Provider configuration.
//!
//! Every attribute of the provider block falls back to an environment
//! variable when it is not configured. Environment lookups go through an
//! [`EnvLookup`] so callers (and tests) decide where values come from.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::state::type_name;

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "CIRCLECI_TOKEN";
/// Environment variable holding the VCS type.
pub const VCS_TYPE_ENV: &str = "CIRCLECI_VCS_TYPE";
/// Environment variable holding the default organization.
pub const ORGANIZATION_ENV: &str = "CIRCLECI_ORGANIZATION";
/// Environment variable holding the API base URL.
pub const URL_ENV: &str = "CIRCLECI_URL";
/// Environment variable holding the value of an imported context variable.
pub const ENV_VALUE_ENV: &str = "CIRCLECI_ENV_VALUE";

/// VCS type used when none is configured.
pub const DEFAULT_VCS_TYPE: &str = "github";
/// API base URL used when none is configured.
pub const DEFAULT_URL: &str = "https://circleci.com/api/v2/";
/// Retry budget used when none is configured.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(300);

/// Function resolving an environment variable.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Lookup backed by the process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|key| std::env::var(key).ok())
}

/// How the API token is presented to CircleCI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// HTTP basic auth with the token as user name and an empty password.
    #[default]
    Basic,
    /// `circle-token` query parameter.
    Query,
}

impl AuthMethod {
    fn parse(value: &str) -> Result<Self, ProviderError> {
        match value {
            "basic" => Ok(Self::Basic),
            "query" => Ok(Self::Query),
            other => Err(ProviderError::Configuration(format!(
                "unknown auth_method '{}', expected 'basic' or 'query'",
                other
            ))),
        }
    }
}

/// Resolved provider configuration.
#[derive(Clone)]
pub struct ProviderConfig {
    /// API token.
    pub api_token: String,
    /// VCS type used in project and owner slugs.
    pub vcs_type: String,
    /// Organization used when a resource does not name one.
    pub organization: Option<String>,
    /// Base URL of the v2 REST API.
    pub url: Url,
    /// Token presentation.
    pub auth_method: AuthMethod,
    /// Total time budget for retrying transient failures.
    pub retry_timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &"<redacted>")
            .field("vcs_type", &self.vcs_type)
            .field("organization", &self.organization)
            .field("url", &self.url.as_str())
            .field("auth_method", &self.auth_method)
            .field("retry_timeout", &self.retry_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Config with the given token and every other attribute at its default.
    pub fn new(api_token: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            api_token: api_token.into(),
            vcs_type: DEFAULT_VCS_TYPE.to_string(),
            organization: None,
            url: parse_base_url(DEFAULT_URL)?,
            auth_method: AuthMethod::default(),
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
        })
    }

    /// Resolve the provider block, consulting `env` for unset attributes.
    pub fn from_value(config: &Value, env: &EnvLookup) -> Result<Self, ProviderError> {
        let block = match config {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(ProviderError::Configuration(format!(
                    "expected provider configuration to be an object, got {}",
                    type_name(other)
                )))
            },
        };
        let string_attr = |key: &str, env_key: &str| -> Result<Option<String>, ProviderError> {
            match block.and_then(|b| b.get(key)) {
                Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
                None | Some(Value::Null) | Some(Value::String(_)) => {
                    Ok(env(env_key).filter(|v| !v.is_empty()))
                },
                Some(other) => Err(ProviderError::Configuration(format!(
                    "expected {} to be a string, got {}",
                    key,
                    type_name(other)
                ))),
            }
        };

        let api_token = string_attr("api_token", TOKEN_ENV)?.ok_or_else(|| {
            ProviderError::Configuration(format!(
                "api_token is required; set it in the provider block or via {}",
                TOKEN_ENV
            ))
        })?;
        let vcs_type =
            string_attr("vcs_type", VCS_TYPE_ENV)?.unwrap_or_else(|| DEFAULT_VCS_TYPE.to_string());
        let organization = string_attr("organization", ORGANIZATION_ENV)?;
        let url = match string_attr("url", URL_ENV)? {
            Some(url) => parse_base_url(&url)?,
            None => parse_base_url(DEFAULT_URL)?,
        };

        let auth_method = match block.and_then(|b| b.get("auth_method")) {
            Some(Value::String(s)) => AuthMethod::parse(s)?,
            None | Some(Value::Null) => AuthMethod::default(),
            Some(other) => {
                return Err(ProviderError::Configuration(format!(
                    "expected auth_method to be a string, got {}",
                    type_name(other)
                )))
            },
        };

        let retry_timeout = match block.and_then(|b| b.get("retry_timeout")) {
            None | Some(Value::Null) => DEFAULT_RETRY_TIMEOUT,
            Some(value) => value.as_u64().map(Duration::from_secs).ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "retry_timeout must be a non-negative number of seconds, got {}",
                    value
                ))
            })?,
        };

        Ok(Self {
            api_token,
            vcs_type,
            organization,
            url,
            auth_method,
            retry_timeout,
        })
    }

    /// Point the client at another API root.
    pub fn with_url(mut self, url: &str) -> Result<Self, ProviderError> {
        self.url = parse_base_url(url)?;
        Ok(self)
    }

    /// Set the default organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Set the token presentation.
    pub fn with_auth_method(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    /// Set the retry budget.
    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = retry_timeout;
        self
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "api_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_env_default(TOKEN_ENV)
                    .with_description("The token key for API operations."),
            )
            .with_attribute(
                "vcs_type",
                Attribute::optional_string()
                    .with_env_default(VCS_TYPE_ENV)
                    .with_description("The VCS type for the organization."),
            )
            .with_attribute(
                "organization",
                Attribute::optional_string()
                    .with_env_default(ORGANIZATION_ENV)
                    .with_description("The CircleCI organization."),
            )
            .with_attribute(
                "url",
                Attribute::optional_string()
                    .with_env_default(URL_ENV)
                    .with_description("The URL of the CircleCI API (v2)."),
            )
            .with_attribute(
                "auth_method",
                Attribute::optional_string()
                    .with_description("How the token is sent: 'basic' (default) or 'query'."),
            )
            .with_attribute(
                "retry_timeout",
                Attribute::optional(AttributeType::Int64)
                    .with_description("Seconds to keep retrying transient API failures."),
            )
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(raw)
        .map_err(|e| ProviderError::Configuration(format!("invalid url '{}': {}", raw, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ProviderError::Configuration(format!(
            "url '{}' must be an absolute http(s) URL",
            raw
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> EnvLookup {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_from_environment() {
        let env = env_of(&[(TOKEN_ENV, "tok"), (ORGANIZATION_ENV, "acme")]);
        let config = ProviderConfig::from_value(&json!({}), &env).unwrap();

        assert_eq!(config.api_token, "tok");
        assert_eq!(config.vcs_type, "github");
        assert_eq!(config.organization.as_deref(), Some("acme"));
        assert_eq!(config.url.as_str(), DEFAULT_URL);
        assert_eq!(config.auth_method, AuthMethod::Basic);
        assert_eq!(config.retry_timeout, DEFAULT_RETRY_TIMEOUT);
    }

    #[test]
    fn test_block_overrides_environment() {
        let env = env_of(&[(TOKEN_ENV, "env-token"), (VCS_TYPE_ENV, "bitbucket")]);
        let config = ProviderConfig::from_value(
            &json!({
                "api_token": "block-token",
                "vcs_type": "gh",
                "url": "http://localhost:8080/api/v2/",
                "auth_method": "query",
                "retry_timeout": 5
            }),
            &env,
        )
        .unwrap();

        assert_eq!(config.api_token, "block-token");
        assert_eq!(config.vcs_type, "gh");
        assert_eq!(config.url.as_str(), "http://localhost:8080/api/v2/");
        assert_eq!(config.auth_method, AuthMethod::Query);
        assert_eq!(config.retry_timeout, Duration::from_secs(5));
        assert!(config.organization.is_none());
    }

    #[test]
    fn test_empty_string_falls_back_to_environment() {
        let env = env_of(&[(TOKEN_ENV, "tok"), (ORGANIZATION_ENV, "acme")]);
        let config = ProviderConfig::from_value(&json!({"organization": ""}), &env).unwrap();
        assert_eq!(config.organization.as_deref(), Some("acme"));
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let err = ProviderConfig::from_value(&Value::Null, &env_of(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains(TOKEN_ENV));
    }

    #[test]
    fn test_rejects_bad_values() {
        let env = env_of(&[(TOKEN_ENV, "tok")]);
        assert!(ProviderConfig::from_value(&json!({"url": "not a url"}), &env).is_err());
        assert!(ProviderConfig::from_value(&json!({"url": "mailto:ops@acme.io"}), &env).is_err());
        assert!(ProviderConfig::from_value(&json!({"auth_method": "bearer"}), &env).is_err());
        assert!(ProviderConfig::from_value(&json!({"retry_timeout": -1}), &env).is_err());
        assert!(ProviderConfig::from_value(&json!({"vcs_type": 1}), &env).is_err());
        assert!(ProviderConfig::from_value(&json!([1]), &env).is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig::new("super-secret-token").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_schema_lists_env_defaults() {
        let schema = ProviderConfig::schema();
        assert_eq!(
            schema.attribute("api_token").unwrap().env_default.as_deref(),
            Some(TOKEN_ENV)
        );
        assert!(schema.attribute("api_token").unwrap().sensitive);
        assert_eq!(
            schema.attribute("url").unwrap().env_default.as_deref(),
            Some(URL_ENV)
        );
    }
}
