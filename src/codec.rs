//! Composite identifiers.
//!
//! CircleCI has no server-side identifier for a project environment variable,
//! so state stores `organization.project.name`. Project names may contain
//! dots themselves: decoding takes the first segment as the organization, the
//! last as the variable name and rejoins everything in between. The same rule
//! applies to the slash-separated paths accepted by import.

use std::fmt;

use crate::error::ProviderError;

/// Separator of environment variable identifiers.
pub const ID_SEPARATOR: char = '.';

/// Separator of import paths and project slugs.
pub const PATH_SEPARATOR: char = '/';

/// Identifier of a project environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentVariableId {
    /// Owning organization.
    pub organization: String,
    /// Project name, possibly containing dots.
    pub project: String,
    /// Variable name.
    pub name: String,
}

impl EnvironmentVariableId {
    /// Create an identifier from its parts.
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            name: name.into(),
        }
    }

    /// Join the parts with `.`.
    pub fn encode(&self) -> String {
        [
            self.organization.as_str(),
            self.project.as_str(),
            self.name.as_str(),
        ]
        .join(".")
    }

    /// Split an identifier produced by [`encode`](Self::encode).
    pub fn decode(id: &str) -> Result<Self, ProviderError> {
        let (organization, project, name) =
            split_outer(id, ID_SEPARATOR).ok_or_else(|| {
                ProviderError::Validation(format!(
                    "invalid environment variable ID '{}'. Please make sure the ID is in the form \
                     ORGANIZATION.PROJECTNAME.VARNAME (i.e. foo.bar.my_var)",
                    id
                ))
            })?;
        Ok(Self::new(organization, project, name))
    }
}

impl fmt::Display for EnvironmentVariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Import path of a context: `organization/context`.
///
/// `context` is either the context UUID or its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextImportPath {
    /// Owning organization.
    pub organization: String,
    /// Context ID or name.
    pub context: String,
}

impl ContextImportPath {
    /// Parse `organization/context`.
    pub fn parse(path: &str) -> Result<Self, ProviderError> {
        match path.split_once(PATH_SEPARATOR) {
            Some((organization, context)) if !organization.is_empty() && !context.is_empty() => {
                Ok(Self {
                    organization: organization.to_string(),
                    context: context.to_string(),
                })
            },
            _ => Err(ProviderError::Validation(format!(
                "invalid import ID '{}': importing a context requires $organization/$context",
                path
            ))),
        }
    }
}

/// Import path of a context environment variable:
/// `organization/context/variable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextVariableImportPath {
    /// Owning organization.
    pub organization: String,
    /// Context ID or name.
    pub context: String,
    /// Variable name.
    pub variable: String,
}

impl ContextVariableImportPath {
    /// Parse `organization/context/variable`.
    pub fn parse(path: &str) -> Result<Self, ProviderError> {
        let (organization, context, variable) =
            split_outer(path, PATH_SEPARATOR).ok_or_else(|| {
                ProviderError::Validation(format!(
                    "invalid import ID '{}': importing a context environment variable requires \
                     $organization/$context/$variable",
                    path
                ))
            })?;
        Ok(Self {
            organization,
            context,
            variable,
        })
    }
}

/// A CircleCI project slug: `vcs/organization/project`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSlug {
    /// VCS type, e.g. `github` or `gh`.
    pub vcs: String,
    /// Owning organization.
    pub organization: String,
    /// Project name.
    pub project: String,
}

impl ProjectSlug {
    /// Create a slug from its parts.
    pub fn new(
        vcs: impl Into<String>,
        organization: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            vcs: vcs.into(),
            organization: organization.into(),
            project: project.into(),
        }
    }

    /// Parse a slug returned by the API. Exactly three segments are accepted.
    pub fn parse(slug: &str) -> Result<Self, ProviderError> {
        let parts: Vec<&str> = slug.split(PATH_SEPARATOR).collect();
        match parts.as_slice() {
            [vcs, organization, project] => Ok(Self::new(*vcs, *organization, *project)),
            _ => Err(ProviderError::Validation(format!(
                "extracting vcs, org, project from project-slug '{}' failed",
                slug
            ))),
        }
    }
}

impl fmt::Display for ProjectSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vcs, self.organization, self.project)
    }
}

/// Split into first, middle (rejoined) and last segment.
///
/// Needs at least three segments and none of the three results may be empty.
fn split_outer(value: &str, separator: char) -> Option<(String, String, String)> {
    let parts: Vec<&str> = value.split(separator).collect();
    if parts.len() < 3 {
        return None;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    let separator = separator.to_string();
    let middle = parts[1..parts.len() - 1].join(separator.as_str());

    if first.is_empty() || middle.is_empty() || last.is_empty() {
        return None;
    }
    Some((first.to_string(), middle, last.to_string()))
}
