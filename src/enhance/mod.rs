//! Tile enhancement.
//!
//! Sends individual tiles to an external image-enhancement service and
//! records the result on the tile.
//!
//! # Components
//!
//! - [`EnhancementOrchestrator`]: Runs one request per tile against the registry
//! - [`EnhancementClient`]: Trait for the external service
//! - [`HttpEnhancementClient`]: JSON-over-HTTP client implementation
//! - [`CredentialProvider`]: Source of the service credential, either a
//!   runtime-settable [`CredentialStore`] or an [`EnvCredentialProvider`]
//! - [`QualityLevel`]: Requested output tier (`1K`, `2K`, `4K`)

mod client;
mod credential;
mod http;
mod orchestrator;
mod quality;

pub use client::EnhancementClient;
pub use credential::{Credential, CredentialProvider, CredentialStore, EnvCredentialProvider};
pub use http::{interpret_response, HttpEnhancementClient, DEFAULT_ENHANCE_TIMEOUT};
pub use orchestrator::{classify, EnhancementOrchestrator, EnhancementOutcome};
pub use quality::{ParseQualityError, QualityLevel};
