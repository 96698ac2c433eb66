//! OS credential store access.
//!
//! Reading a keychain item may show a system prompt and block until the user
//! answers, so the store only probes keychain sources when the caller opts in.
//!
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)

use async_trait::async_trait;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::KeychainError;

// ============================================================================
// Keychain Sources
// ============================================================================

/// A keychain item that can back a `system-keychain` profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeychainSource {
    /// Profile id to register when the item exists.
    pub profile_id: String,
    /// Provider of the profile.
    pub provider: String,
    /// Keychain service name.
    pub service: String,
    /// Keychain account name.
    #[serde(default)]
    pub account: String,
}

impl KeychainSource {
    /// Claude subscription credentials written by the Claude CLI.
    pub fn claude_pro() -> Self {
        Self {
            profile_id: "claude-pro:system-keychain".to_string(),
            provider: "claude-pro".to_string(),
            service: "Claude Code-credentials".to_string(),
            account: String::new(),
        }
    }
}

// ============================================================================
// Keychain API Trait
// ============================================================================

/// Read access to the OS credential store.
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Gets a secret.
    ///
    /// * `Ok(Some(secret))` - item found
    /// * `Ok(None)` - item missing or empty
    /// * `Err(e)` - the credential store could not be queried
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError>;

    /// Checks if a non-empty secret exists.
    async fn exists(&self, service: &str, account: &str) -> bool {
        matches!(self.get(service, account).await, Ok(Some(_)))
    }
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// [`KeychainApi`] backed by the `keyring` crate.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    /// Creates a new system keychain instance.
    pub fn new() -> Self {
        Self
    }

    fn read(service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let entry =
            Entry::new(service, account).map_err(|e| KeychainError::Platform(e.to_string()))?;
        match entry.get_password() {
            Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeychainApi for SystemKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %service, account = %account, "Getting credential from keychain");

        let (svc, acct) = (service.to_string(), account.to_string());
        // May block on a user prompt.
        let result = tokio::task::spawn_blocking(move || Self::read(&svc, &acct))
            .await
            .map_err(|e| KeychainError::Other(e.to_string()))?;

        match &result {
            Ok(Some(_)) => debug!(service = %service, account = %account, "Credential found"),
            Ok(None) => debug!(service = %service, account = %account, "Credential not found"),
            Err(e) => {
                warn!(service = %service, account = %account, error = %e, "Failed to get credential");
            }
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
