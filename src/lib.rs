//! CircleCI provider core.
//!
//! This crate manages CircleCI project environment variables, contexts,
//! context environment variables and scheduled pipelines through CircleCI's
//! v2 REST API, behind the [`ProviderService`] interface an
//! infrastructure-as-code host drives.
//!
//! # Overview
//!
//! - **Client** ([`client`]): authenticated REST transport, typed API models
//!   and a retry policy for transient failures (429, 500, 502, 503)
//! - **Identifiers** ([`codec`]): composite state IDs such as
//!   `organization.project.NAME` and slash-separated import paths
//! - **Masking** ([`masking`]): secrets are stored as SHA-256 digests
//! - **Resources** ([`resources`]): one module per resource type plus the
//!   `circleci_context` data source
//! - **Plans and migrations** ([`plan`], [`migration`])
//! - **Testing** ([`testing`]): [`ProviderTester`](testing::ProviderTester)
//!   and plan assertions
//!
//! # Quick Start
//!
//! ```ignore
//! use circleci_provider::{init_logging, CircleCiProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = CircleCiProvider::new();
//!     provider
//!         .configure(json!({"organization": "acme"}))
//!         .await?;
//!
//!     let state = provider
//!         .create(
//!             "circleci_environment_variable",
//!             json!({"project": "web", "name": "API_KEY", "value": "s3cr3t"}),
//!         )
//!         .await?;
//!     assert_eq!(state["id"], "acme.web.API_KEY");
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `CIRCLECI_TOKEN`, `CIRCLECI_VCS_TYPE`, `CIRCLECI_ORGANIZATION`,
//!   `CIRCLECI_URL`: defaults for the provider block
//! - `CIRCLECI_ENV_VALUE`: value recorded when importing a context
//!   environment variable
//! - `RUST_LOG`: log filter (see [`logging`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod masking;
pub mod migration;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod state;
pub mod testing;
pub mod validation;

// Re-export main types at crate root
pub use client::{Client, RetryPolicy};
pub use codec::EnvironmentVariableId;
pub use config::{AuthMethod, ProviderConfig};
pub use error::{ApiError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use masking::{censor, hash_value};
pub use plan::{AttributeChange, ImportedResource, PlanResult};
pub use provider::CircleCiProvider;
pub use schema::ProviderSchema;
pub use service::{ProviderMetadata, ProviderService};
pub use state::ResourceData;
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
