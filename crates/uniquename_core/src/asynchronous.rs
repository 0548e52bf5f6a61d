//! Async wrapper for use from tokio tasks.

use crate::error::{RegistryError, RegistryResult};
use crate::record::OwnershipRecord;
use crate::registry::UniqueNames;
use std::sync::Arc;
use uniquename_store::KvStore;

/// Runs registry operations on tokio's blocking pool.
///
/// Store transactions block while they retry, so they are moved off the
/// async worker threads. Cloning is cheap and shares the registry.
pub struct AsyncUniqueNames<S: KvStore + 'static> {
    inner: Arc<UniqueNames<S>>,
}

impl<S: KvStore + 'static> Clone for AsyncUniqueNames<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KvStore + 'static> From<UniqueNames<S>> for AsyncUniqueNames<S> {
    fn from(names: UniqueNames<S>) -> Self {
        Self::new(Arc::new(names))
    }
}

impl<S: KvStore + 'static> AsyncUniqueNames<S> {
    /// Wraps a shared registry.
    pub fn new(inner: Arc<UniqueNames<S>>) -> Self {
        Self { inner }
    }

    /// Returns the wrapped registry.
    pub fn registry(&self) -> &Arc<UniqueNames<S>> {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> RegistryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&UniqueNames<S>) -> RegistryResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner))
            .await
            .map_err(|e| RegistryError::Task {
                message: e.to_string(),
            })?
    }

    /// See [`UniqueNames::take`].
    ///
    /// # Errors
    ///
    /// Returns the registry's error, or [`RegistryError::Task`] if the
    /// blocking task panicked or was cancelled.
    pub async fn take(
        &self,
        name: impl Into<String>,
        owner_id: impl Into<String>,
        expires_at: Option<u64>,
    ) -> RegistryResult<bool> {
        let (name, owner_id) = (name.into(), owner_id.into());
        self.run(move |names| names.take(&name, &owner_id, expires_at))
            .await
    }

    /// See [`UniqueNames::entity_for_name`].
    ///
    /// # Errors
    ///
    /// See [`AsyncUniqueNames::take`].
    pub async fn entity_for_name(
        &self,
        name: impl Into<String>,
    ) -> RegistryResult<Option<OwnershipRecord>> {
        let name = name.into();
        self.run(move |names| names.entity_for_name(&name)).await
    }

    /// See [`UniqueNames::change_owner`].
    ///
    /// # Errors
    ///
    /// See [`AsyncUniqueNames::take`].
    pub async fn change_owner(
        &self,
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        expires_at: Option<u64>,
    ) -> RegistryResult<bool> {
        let (name, from, to) = (name.into(), from.into(), to.into());
        self.run(move |names| names.change_owner(&name, &from, &to, expires_at))
            .await
    }

    /// See [`UniqueNames::remove_name`].
    ///
    /// # Errors
    ///
    /// See [`AsyncUniqueNames::take`].
    pub async fn remove_name(&self, name: impl Into<String>) -> RegistryResult<()> {
        let name = name.into();
        self.run(move |names| names.remove_name(&name)).await
    }

    /// See [`UniqueNames::entries`].
    ///
    /// # Errors
    ///
    /// See [`AsyncUniqueNames::take`].
    pub async fn entries(&self) -> RegistryResult<Vec<OwnershipRecord>> {
        self.run(UniqueNames::entries).await
    }
}
