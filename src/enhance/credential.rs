//! Credentials for the enhancement service.
//!
//! The orchestrator receives a [`CredentialProvider`] at construction and
//! asks it for a [`Credential`] on every request; nothing reads secrets from
//! global state. The secret is only ever handed to the enhancement client.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use sha2::{Digest, Sha256};
use tracing::info;

/// Number of hex characters shown by [`Credential::fingerprint`].
const FINGERPRINT_LEN: usize = 12;

// =============================================================================
// Credential
// =============================================================================

/// Secret used to authorize enhancement calls.
///
/// `Debug` prints a fingerprint, never the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a secret. Returns `None` for blank input.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw secret, for the client building the request.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 fingerprint, safe to log and display.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Source of the enhancement credential.
pub trait CredentialProvider: Send + Sync {
    /// Current credential, if one is configured.
    fn credential(&self) -> Option<Credential>;

    /// Whether a credential is configured.
    fn has_credential(&self) -> bool {
        self.credential().is_some()
    }
}

/// In-memory credential that can be set and removed at runtime.
#[derive(Default)]
pub struct CredentialStore {
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
        }
    }

    /// Create a store from an optional raw secret (e.g. a CLI flag).
    pub fn from_secret(secret: Option<&str>) -> Self {
        Self {
            current: RwLock::new(secret.and_then(Credential::new)),
        }
    }

    /// Replace the stored credential.
    pub fn set(&self, credential: Credential) {
        info!(fingerprint = %credential.fingerprint(), "Credential configured");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    /// Remove the stored credential. Returns whether one was present.
    pub fn clear(&self) -> bool {
        let removed = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if removed {
            info!("Credential removed");
        }
        removed
    }
}

impl CredentialProvider for CredentialStore {
    fn credential(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Reads the credential from an environment variable on every call.
///
/// Picks up a key exported after startup without restarting the process.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Name of the variable consulted.
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credential(&self) -> Option<Credential> {
        std::env::var(&self.var).ok().and_then(Credential::new)
    }
}

// =============================================================================
// Tests
// =============================================================================
