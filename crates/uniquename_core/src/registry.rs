//! The name registry.

use crate::claim::{decide_take, decide_transfer, Decision};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::keyspace::NameKeySpace;
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::record::OwnershipRecord;
use std::fmt;
use std::sync::mpsc::Receiver;
use std::sync::OnceLock;
use tracing::{info, trace, warn};
use uniquename_store::{DirectoryLayer, KvStore, KvTransaction};

/// A registry of uniquely owned names backed by a transactional store.
///
/// Each name maps to at most one [`OwnershipRecord`]. Claims may carry an
/// expiration; an expired claim stays in the store until someone else takes
/// the name, and is only ever evaluated when read.
///
/// Every operation runs its read-decide-write inside one store transaction,
/// so concurrent callers racing for the same name are serialized by the
/// store's conflict detection. The registry itself holds no per-name locks
/// and spawns no threads.
///
/// # Composition
///
/// Each operation has an `_in` variant that runs inside a transaction owned
/// by the caller. Combine them with [`UniqueNames::transact`] to change
/// several names atomically:
///
/// ```rust
/// use uniquename_core::{RegistryConfig, UniqueNames};
/// use uniquename_store::MemoryStore;
///
/// let names = UniqueNames::open(MemoryStore::new(), RegistryConfig::default()).unwrap();
/// assert!(names.take("old-handle", "user1", None).unwrap());
///
/// names
///     .transact(|txn| {
///         names.remove_name_in(txn, "old-handle")?;
///         names.take_in(txn, "new-handle", "user1", None)
///     })
///     .unwrap();
///
/// assert!(names.entity_for_name("old-handle").unwrap().is_none());
/// ```
pub struct UniqueNames<S: KvStore> {
    config: RegistryConfig,
    directories: DirectoryLayer,
    store: OnceLock<S>,
    keys: OnceLock<NameKeySpace>,
    lifecycle: Lifecycle,
}

impl<S: KvStore> UniqueNames<S> {
    /// Creates a registry without a store.
    ///
    /// The registry starts `Disconnected`. Supply a store with
    /// [`Self::attach_store`], then call [`Self::connect`].
    pub fn new(config: RegistryConfig) -> Self {
        let names = Self::build(config, OnceLock::new());
        names.lifecycle.transition(ConnectionState::Disconnected);
        names
    }

    /// Creates a registry with a store. It stays `Uninitialized` until
    /// [`Self::connect`] is called.
    pub fn with_store(store: S, config: RegistryConfig) -> Self {
        Self::build(config, OnceLock::from(store))
    }

    /// Creates a registry and connects it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Connection`] if the directory cannot be
    /// opened.
    pub fn open(store: S, config: RegistryConfig) -> RegistryResult<Self> {
        let names = Self::with_store(store, config);
        names.connect()?;
        Ok(names)
    }

    fn build(config: RegistryConfig, store: OnceLock<S>) -> Self {
        Self {
            config,
            directories: DirectoryLayer::new(),
            store,
            keys: OnceLock::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Supplies the store for a registry created with [`Self::new`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreAlreadyAttached`] if a store is already
    /// set.
    pub fn attach_store(&self, store: S) -> RegistryResult<()> {
        self.store
            .set(store)
            .map_err(|_| RegistryError::StoreAlreadyAttached)
    }

    /// Opens or creates the registry directory and moves to `Connected`.
    ///
    /// Only one attempt is allowed. On failure the registry moves to
    /// `Disconnected` and stays there.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::MissingStore`] if no store has been supplied; this
    ///   does not use up the attempt
    /// - [`RegistryError::ConnectAlreadyAttempted`] on a second call
    /// - [`RegistryError::Connection`] if the directory cannot be opened
    pub fn connect(&self) -> RegistryResult<()> {
        let store = self.store.get().ok_or(RegistryError::MissingStore)?;
        self.lifecycle.begin_connect()?;

        let directory = self.config.directory_display();
        match self
            .directories
            .create_or_open(store, &self.config.retry, &self.config.directory)
        {
            Ok(root) => {
                let canonicalizer = self.config.canonicalizer.clone();
                self.keys
                    .get_or_init(|| NameKeySpace::new(root, canonicalizer));
                self.lifecycle.transition(ConnectionState::Connected);
                info!(%directory, "registry connected");
                Ok(())
            }
            Err(source) => {
                warn!(%directory, error = %source, "cannot open registry directory");
                self.lifecycle.transition(ConnectionState::Disconnected);
                Err(RegistryError::Connection { directory, source })
            }
        }
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Returns the receiver of state transitions.
    ///
    /// There is one receiver per registry; later calls return `None`.
    /// Transitions made before the call are buffered.
    pub fn take_state_events(&self) -> Option<Receiver<ConnectionState>> {
        self.lifecycle.take_events()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the store, if one has been supplied.
    pub fn store(&self) -> Option<&S> {
        self.store.get()
    }

    fn keys(&self) -> RegistryResult<&NameKeySpace> {
        self.lifecycle.ensure_connected()?;
        self.keys.get().ok_or(RegistryError::NotConnected {
            state: self.state(),
        })
    }

    fn connected(&self) -> RegistryResult<(&S, &NameKeySpace)> {
        let keys = self.keys()?;
        let store = self.store.get().ok_or(RegistryError::MissingStore)?;
        Ok((store, keys))
    }

    /// Returns the store key for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConnected`] before a successful connect.
    pub fn key_for(&self, name: &str) -> RegistryResult<Vec<u8>> {
        Ok(self.keys()?.key_for(name))
    }

    /// Runs `body` in a retrying transaction.
    ///
    /// `body` may run more than once and must not have side effects outside
    /// the transaction.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a store error if the transaction cannot
    /// be committed.
    pub fn transact<T, F>(&self, body: F) -> RegistryResult<T>
    where
        F: FnMut(&mut S::Transaction) -> RegistryResult<T>,
    {
        let (store, _) = self.connected()?;
        store.transact(&self.config.retry, body)
    }

    /// Runs `body` in a transaction that is aborted afterwards.
    fn read<T, F>(&self, body: F) -> RegistryResult<T>
    where
        F: FnOnce(&mut S::Transaction, &NameKeySpace) -> RegistryResult<T>,
    {
        let (store, keys) = self.connected()?;
        let mut txn = store.begin()?;
        let result = body(&mut txn, keys);
        store.abort(txn);
        result
    }

    fn read_record(
        txn: &mut S::Transaction,
        key: &[u8],
    ) -> RegistryResult<Option<OwnershipRecord>> {
        txn.get(key)?
            .map(|bytes| OwnershipRecord::decode(&bytes))
            .transpose()
    }

    fn apply(txn: &mut S::Transaction, key: &[u8], decision: &Decision) -> RegistryResult<()> {
        if let Decision::Write(record) = decision {
            txn.set(key, &record.encode()?)?;
        }
        Ok(())
    }

    /// Claims `name` for `owner_id`, optionally until `expires_at`
    /// (milliseconds since the Unix epoch).
    ///
    /// Returns `true` if `owner_id` holds the name afterwards: the name was
    /// free, its previous claim had expired, or `owner_id` already held it.
    /// A renewal by the current owner rewrites the record only when the
    /// expiration changes. Returns `false` if someone else holds a live claim.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is not connected, the stored record
    /// cannot be decoded, or the store fails.
    pub fn take(
        &self,
        name: &str,
        owner_id: &str,
        expires_at: Option<u64>,
    ) -> RegistryResult<bool> {
        self.transact(|txn| self.take_in(txn, name, owner_id, expires_at))
    }

    /// [`Self::take`] inside a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::take`].
    pub fn take_in(
        &self,
        txn: &mut S::Transaction,
        name: &str,
        owner_id: &str,
        expires_at: Option<u64>,
    ) -> RegistryResult<bool> {
        let key = self.keys()?.key_for(name);
        let current = Self::read_record(txn, &key)?;
        let now = self.config.clock.now_millis();

        let decision = decide_take(current.as_ref(), name, owner_id, expires_at, now);
        trace!(name = %name, owner = %owner_id, decision = decision.label(), "take");
        Self::apply(txn, &key, &decision)?;
        Ok(decision.succeeded())
    }

    /// Returns the record for `name`, or `None` if nobody has claimed it.
    ///
    /// Expired records are returned as stored; check
    /// [`OwnershipRecord::is_expired_at`] to tell them apart.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Decode`] if the stored value is not a valid
    /// record, or a store error.
    pub fn entity_for_name(&self, name: &str) -> RegistryResult<Option<OwnershipRecord>> {
        self.read(|txn, keys| Self::read_record(txn, &keys.key_for(name)))
    }

    /// [`Self::entity_for_name`] inside a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::entity_for_name`].
    pub fn entity_for_name_in(
        &self,
        txn: &mut S::Transaction,
        name: &str,
    ) -> RegistryResult<Option<OwnershipRecord>> {
        let key = self.keys()?.key_for(name);
        Self::read_record(txn, &key)
    }

    /// Transfers `name` from `from` to `to`, setting or clearing the
    /// expiration.
    ///
    /// Returns `true` if `to` holds the name afterwards, including when a
    /// previous attempt already moved it. Returns `false` if the name is free
    /// or held by someone else.
    ///
    /// Expiration of the `from` claim is not checked unless
    /// [`RegistryConfig::strict_transfers`] is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is not connected, the stored record
    /// cannot be decoded, or the store fails.
    pub fn change_owner(
        &self,
        name: &str,
        from: &str,
        to: &str,
        expires_at: Option<u64>,
    ) -> RegistryResult<bool> {
        self.transact(|txn| self.change_owner_in(txn, name, from, to, expires_at))
    }

    /// [`Self::change_owner`] inside a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::change_owner`].
    pub fn change_owner_in(
        &self,
        txn: &mut S::Transaction,
        name: &str,
        from: &str,
        to: &str,
        expires_at: Option<u64>,
    ) -> RegistryResult<bool> {
        let key = self.keys()?.key_for(name);
        let current = Self::read_record(txn, &key)?;
        let now = self.config.clock.now_millis();

        let decision = decide_transfer(
            current.as_ref(),
            from,
            to,
            expires_at,
            now,
            self.config.strict_transfers,
        );
        trace!(name = %name, from = %from, to = %to, decision = decision.label(), "change owner");
        Self::apply(txn, &key, &decision)?;
        Ok(decision.succeeded())
    }

    /// Deletes the record for `name`, whoever holds it. Removing a free name
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is not connected or the store fails.
    pub fn remove_name(&self, name: &str) -> RegistryResult<()> {
        self.transact(|txn| self.remove_name_in(txn, name))
    }

    /// [`Self::remove_name`] inside a caller-supplied transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::remove_name`].
    pub fn remove_name_in(&self, txn: &mut S::Transaction, name: &str) -> RegistryResult<()> {
        let key = self.keys()?.key_for(name);
        trace!(name = %name, "remove");
        txn.clear(&key)?;
        Ok(())
    }

    /// Returns every stored record in canonical name order, expired ones
    /// included.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be decoded or the store fails.
    pub fn entries(&self) -> RegistryResult<Vec<OwnershipRecord>> {
        self.read(|txn, keys| {
            let (begin, end) = keys.names_range();
            txn.get_range(&begin, &end)?
                .iter()
                .map(|(_, value)| OwnershipRecord::decode(value))
                .collect()
        })
    }
}

impl<S: KvStore> fmt::Debug for UniqueNames<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueNames")
            .field("directory", &self.config.directory_display())
            .field("state", &self.state())
            .field("has_store", &self.store.get().is_some())
            .field("strict_transfers", &self.config.strict_transfers)
            .finish()
    }
}
