//! Project environment variables.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{project_segments, ApiRequest, Client};
use crate::codec::ProjectSlug;
use crate::error::ProviderError;

/// A project environment variable as returned by the API.
///
/// The API never returns the stored value; `value` holds a masked echo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// Masked value.
    #[serde(default)]
    pub value: String,
}

fn envvar_segments(slug: &ProjectSlug, name: Option<&str>) -> Vec<String> {
    let mut segments = project_segments(slug);
    segments.push("envvar".to_string());
    if let Some(name) = name {
        segments.push(name.to_string());
    }
    segments
}

impl Client {
    /// Whether the variable exists: 200 is `true`, 404 is `false`, anything
    /// else is an error.
    pub async fn has_project_environment_variable(
        &self,
        slug: &ProjectSlug,
        name: &str,
    ) -> Result<bool, ProviderError> {
        let request = ApiRequest::get(envvar_segments(slug, Some(name)));
        match self.transport().call_empty(&request).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Fetch a variable; `None` when the API answers 404.
    pub async fn get_project_environment_variable(
        &self,
        slug: &ProjectSlug,
        name: &str,
    ) -> Result<Option<ProjectEnvironmentVariable>, ProviderError> {
        let request = ApiRequest::get(envvar_segments(slug, Some(name)));
        match self.transport().call(&request).await {
            Ok(variable) => Ok(Some(variable)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create a variable.
    pub async fn create_project_environment_variable(
        &self,
        slug: &ProjectSlug,
        name: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        let request = ApiRequest::post(envvar_segments(slug, None))
            .with_body(json!({"name": name, "value": value}));
        self.transport().call_empty(&request).await
    }

    /// Delete a variable.
    pub async fn delete_project_environment_variable(
        &self,
        slug: &ProjectSlug,
        name: &str,
    ) -> Result<(), ProviderError> {
        let request = ApiRequest::delete(envvar_segments(slug, Some(name)));
        self.transport().call_empty(&request).await
    }
}
