//! Shared auth profile stores.
//!
//! One [`AuthStoreHandle`] exists per resolved agent directory. Every mutation
//! reloads `auth-profiles.json`, applies the transition, swaps the in-memory
//! state and writes the file back atomically. Concurrent processes race with
//! last-writer-wins semantics; reloading right before the write keeps the
//! lost-update window small.
//!
//! After a failed write the in-memory state is authoritative: later
//! mutations build on it instead of the stale file until a write succeeds.
//! An unparseable file is renamed to `auth-profiles.json.corrupt-<epoch ms>`
//! and replaced by the in-memory state on the next write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use credwarden_core::{AuthProfileStore, Credential, FailureOutcome, FailureReason};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::keychain::{KeychainApi, KeychainSource, SystemKeychain};
use crate::persistence::{
    auth_store_path, default_agent_dir, load_json_if_exists, move_aside, save_json,
};

// ============================================================================
// Loading
// ============================================================================

/// What was found on disk.
enum DiskState {
    Loaded(AuthProfileStore),
    Missing,
    Unreadable(StoreError),
}

async fn read_disk(path: &Path) -> DiskState {
    match load_json_if_exists::<AuthProfileStore>(path).await {
        Ok(Some(store)) => DiskState::Loaded(store),
        Ok(None) => DiskState::Missing,
        Err(e) => DiskState::Unreadable(e),
    }
}

/// Options for [`AuthStoreRegistry::ensure`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsureOptions {
    /// Allow reads from the OS keychain, which may block on a user prompt.
    /// Latency-sensitive callers leave this off.
    pub allow_keychain_prompt: bool,
}

// ============================================================================
// Auth Store Handle
// ============================================================================

/// Shared, persisted auth profile store for one agent directory.
pub struct AuthStoreHandle {
    agent_dir: PathBuf,
    path: PathBuf,
    state: RwLock<AuthProfileStore>,
    /// Memory holds changes the last write failed to persist.
    unsaved: AtomicBool,
    keychain_probed: AtomicBool,
    notify: watch::Sender<u64>,
}

impl std::fmt::Debug for AuthStoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStoreHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl AuthStoreHandle {
    /// Opens the store of an agent directory. Missing or unreadable files
    /// yield an empty store.
    pub async fn open(agent_dir: impl Into<PathBuf>) -> Self {
        let agent_dir = agent_dir.into();
        let path = auth_store_path(&agent_dir);

        let store = match read_disk(&path).await {
            DiskState::Loaded(store) => {
                info!(
                    path = %path.display(),
                    profiles = store.profiles.len(),
                    "Loaded auth profile store"
                );
                store
            }
            DiskState::Missing => {
                debug!(path = %path.display(), "No auth profile store, starting empty");
                AuthProfileStore::default()
            }
            DiskState::Unreadable(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable auth profile store, starting empty");
                AuthProfileStore::default()
            }
        };

        let (notify, _) = watch::channel(0);
        Self {
            agent_dir,
            path,
            state: RwLock::new(store),
            unsaved: AtomicBool::new(false),
            keychain_probed: AtomicBool::new(false),
            notify,
        }
    }

    /// Returns the agent directory.
    pub fn agent_dir(&self) -> &Path {
        &self.agent_dir
    }

    /// Returns the path of `auth-profiles.json`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the in-memory store.
    pub async fn snapshot(&self) -> AuthProfileStore {
        self.state.read().await.clone()
    }

    /// Runs a read-only closure against the in-memory store.
    pub async fn read<R>(&self, f: impl FnOnce(&AuthProfileStore) -> R) -> R {
        f(&*self.state.read().await)
    }

    /// Subscribes to change notifications. The value is a mutation counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    /// Picks up changes other processes wrote to the store file.
    ///
    /// Memory is kept when the file is missing or unreadable, or when it holds
    /// changes that were never persisted.
    pub async fn refresh(&self) {
        if self.unsaved.load(Ordering::SeqCst) {
            return;
        }
        let mut guard = self.state.write().await;
        if self.unsaved.load(Ordering::SeqCst) {
            return;
        }
        match read_disk(&self.path).await {
            DiskState::Loaded(store) if *guard != store => {
                debug!(path = %self.path.display(), "Auth profile store changed on disk");
                *guard = store;
                self.notify.send_modify(|v| *v = v.wrapping_add(1));
            }
            DiskState::Loaded(_) | DiskState::Missing => {}
            DiskState::Unreadable(e) => {
                debug!(path = %self.path.display(), error = %e, "Unreadable store on refresh, keeping memory");
            }
        }
    }

    /// Reloads, applies `f` and persists. `f` returning `None` means nothing
    /// changed and the file is not written.
    ///
    /// The in-memory state is updated before writing, so a write error leaves
    /// memory ahead of disk and the next mutation starts from memory.
    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut AuthProfileStore) -> Option<R>,
    ) -> Result<Option<R>, StoreError> {
        let mut guard = self.state.write().await;
        let unsaved = self.unsaved.load(Ordering::SeqCst);

        let (mut working, unreadable) = match read_disk(&self.path).await {
            DiskState::Loaded(store) if !unsaved => (store, None),
            DiskState::Loaded(_) | DiskState::Missing => (guard.clone(), None),
            DiskState::Unreadable(e) => (guard.clone(), Some(e)),
        };

        let Some(result) = f(&mut working) else {
            return Ok(None);
        };
        *guard = working;
        self.notify.send_modify(|v| *v = v.wrapping_add(1));

        if let Some(e) = unreadable {
            match move_aside(&self.path, Utc::now().timestamp_millis()).await {
                Ok(moved) => warn!(
                    path = %self.path.display(),
                    moved_to = %moved.display(),
                    error = %e,
                    "Moved unreadable auth profile store aside"
                ),
                Err(move_err) => {
                    self.unsaved.store(true, Ordering::SeqCst);
                    warn!(path = %self.path.display(), error = %move_err, "Could not move unreadable store aside");
                    return Err(move_err);
                }
            }
        }

        if let Err(e) = save_json(&self.path, &*guard).await {
            self.unsaved.store(true, Ordering::SeqCst);
            warn!(path = %self.path.display(), error = %e, "Failed to save auth profile store, keeping changes in memory");
            return Err(e);
        }
        self.unsaved.store(false, Ordering::SeqCst);
        Ok(Some(result))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Records a failure at the current time.
    pub async fn mark_failure(
        &self,
        profile_id: &str,
        reason: FailureReason,
        model: Option<&str>,
        config: &EngineConfig,
    ) -> Result<Option<FailureOutcome>, StoreError> {
        self.mark_failure_at(profile_id, reason, model, config, Utc::now())
            .await
    }

    /// Records a failure. Unknown profiles are ignored and return `Ok(None)`.
    pub async fn mark_failure_at(
        &self,
        profile_id: &str,
        reason: FailureReason,
        model: Option<&str>,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<FailureOutcome>, StoreError> {
        let outcome = self
            .mutate(|store| {
                let provider = store.profile_provider(profile_id)?;
                let policy = config.recovery_policy(&provider);
                store.record_failure(profile_id, reason, model, &policy, now)
            })
            .await?;

        match &outcome {
            Some(FailureOutcome::Disabled { until }) => {
                warn!(profile_id = %profile_id, reason = %reason, until, "Auth profile disabled");
            }
            Some(FailureOutcome::CoolingDown { until }) => {
                info!(profile_id = %profile_id, reason = %reason, until, "Auth profile cooling down");
            }
            Some(FailureOutcome::ModelCoolingDown { model, until }) => {
                info!(profile_id = %profile_id, model = %model, until, "Model cooling down for profile");
            }
            Some(FailureOutcome::Recorded) => {
                info!(profile_id = %profile_id, reason = %reason, "Auth profile failure recorded");
            }
            None => debug!(profile_id = %profile_id, "Failure for unknown profile ignored"),
        }
        Ok(outcome)
    }

    /// Records a successful call at the current time.
    pub async fn mark_used(&self, profile_id: &str, model: Option<&str>) -> Result<bool, StoreError> {
        self.mark_used_at(profile_id, model, Utc::now()).await
    }

    /// Records a successful call. See [`AuthProfileStore::record_success`].
    pub async fn mark_used_at(
        &self,
        profile_id: &str,
        model: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self
            .mutate(|store| store.record_success(profile_id, model, now).then_some(()))
            .await?;
        Ok(changed.is_some())
    }

    /// Clears a short cooldown. See [`AuthProfileStore::clear_cooldown`].
    pub async fn clear_cooldown(&self, profile_id: &str, model: Option<&str>) -> Result<bool, StoreError> {
        let changed = self
            .mutate(|store| store.clear_cooldown(profile_id, model).then_some(()))
            .await?;
        if changed.is_some() {
            info!(profile_id = %profile_id, "Cleared auth profile cooldown");
        }
        Ok(changed.is_some())
    }

    /// Inserts or replaces a profile.
    pub async fn upsert_profile(
        &self,
        profile_id: &str,
        provider: &str,
        credential: Credential,
    ) -> Result<(), StoreError> {
        self.mutate(|store| {
            store.upsert_profile(profile_id, provider, credential);
            Some(())
        })
        .await?;
        debug!(profile_id = %profile_id, "Upserted auth profile");
        Ok(())
    }

    /// Registers a `system-keychain` profile for every source whose secret is
    /// present. Runs at most once per handle.
    async fn import_keychain_profiles(&self, keychain: &dyn KeychainApi, sources: &[KeychainSource]) {
        if self.keychain_probed.swap(true, Ordering::SeqCst) {
            return;
        }
        for source in sources {
            if self.read(|store| store.has_profile(&source.profile_id)).await {
                continue;
            }
            if !keychain.exists(&source.service, &source.account).await {
                continue;
            }
            match self
                .upsert_profile(&source.profile_id, &source.provider, Credential::SystemKeychain)
                .await
            {
                Ok(()) => info!(profile_id = %source.profile_id, "Imported keychain profile"),
                Err(e) => {
                    warn!(profile_id = %source.profile_id, error = %e, "Failed to persist keychain profile");
                }
            }
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owns one [`AuthStoreHandle`] per agent directory.
pub struct AuthStoreRegistry {
    stores: Mutex<HashMap<PathBuf, Arc<AuthStoreHandle>>>,
    keychain: Arc<dyn KeychainApi>,
    keychain_sources: Vec<KeychainSource>,
}

impl Default for AuthStoreRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemKeychain::new()), vec![KeychainSource::claude_pro()])
    }
}

impl AuthStoreRegistry {
    /// Creates a registry with an explicit keychain and source list.
    pub fn new(keychain: Arc<dyn KeychainApi>, keychain_sources: Vec<KeychainSource>) -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
            keychain,
            keychain_sources,
        }
    }

    /// Creates a registry using the system keychain and configured sources.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(SystemKeychain::new()),
            config.auth.keychain_sources.clone(),
        )
    }

    /// Returns the shared store of an agent directory, creating it on first
    /// use. `None` means the default agent directory.
    pub async fn ensure(&self, agent_dir: Option<&Path>, options: EnsureOptions) -> Arc<AuthStoreHandle> {
        let dir = resolve_agent_dir(agent_dir);

        let handle = {
            let mut stores = self.stores.lock().await;
            match stores.get(&dir) {
                Some(handle) => Arc::clone(handle),
                None => {
                    let handle = Arc::new(AuthStoreHandle::open(dir.clone()).await);
                    stores.insert(dir, Arc::clone(&handle));
                    handle
                }
            }
        };

        if options.allow_keychain_prompt {
            handle
                .import_keychain_profiles(self.keychain.as_ref(), &self.keychain_sources)
                .await;
        }
        handle
    }

    /// Drops every cached handle. Existing `Arc`s stay usable.
    pub async fn reset(&self) {
        self.stores.lock().await.clear();
        debug!("Auth store registry reset");
    }
}

fn resolve_agent_dir(agent_dir: Option<&Path>) -> PathBuf {
    let dir = agent_dir.map_or_else(default_agent_dir, Path::to_path_buf);
    std::path::absolute(&dir).unwrap_or(dir)
}

// ============================================================================
// Tests
// ============================================================================
