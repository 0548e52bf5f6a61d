//! Test fixtures and registry helpers.
//!
//! Fixtures run on a [`ManualClock`] so that expiration is deterministic.

use std::sync::Arc;
use std::time::Duration;
use uniquename_core::{ManualClock, RegistryConfig, UniqueNames};
use uniquename_store::MemoryStore;

/// Clock reading every fixture starts at.
pub const FIXTURE_EPOCH: u64 = 1_700_000_000_000;

/// A connected registry over a fresh in-memory store, with a manual clock.
pub struct TestRegistry {
    /// The registry.
    pub names: UniqueNames<MemoryStore>,
    /// Clock the registry reads.
    pub clock: Arc<ManualClock>,
}

impl TestRegistry {
    /// Creates a registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates a registry that refuses transfers from expired owners.
    pub fn strict() -> Self {
        Self::with_config(RegistryConfig::default().strict_transfers(true))
    }

    /// Creates a registry from `config`, replacing its clock.
    pub fn with_config(config: RegistryConfig) -> Self {
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH));
        let names = UniqueNames::open(MemoryStore::new(), config.clock(clock.clone()))
            .expect("Failed to open in-memory registry");
        Self { names, clock }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &MemoryStore {
        self.names.store().expect("Fixture registry has a store")
    }

    /// Returns the current clock reading.
    pub fn now(&self) -> u64 {
        use uniquename_core::Clock;
        self.clock.now_millis()
    }

    /// Moves the clock forward.
    pub fn advance_millis(&self, millis: u64) {
        self.clock.advance(Duration::from_millis(millis));
    }

    /// Returns the owner of `name`, expired or not.
    pub fn owner_of(&self, name: &str) -> Option<String> {
        self.names
            .entity_for_name(name)
            .expect("Failed to read record")
            .map(|record| record.owner_id)
    }

    /// Returns the owner of `name` if the claim is live.
    pub fn live_owner_of(&self, name: &str) -> Option<String> {
        let now = self.now();
        self.names
            .entity_for_name(name)
            .expect("Failed to read record")
            .filter(|record| !record.is_expired_at(now))
            .map(|record| record.owner_id)
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestRegistry {
    type Target = UniqueNames<MemoryStore>;

    fn deref(&self) -> &Self::Target {
        &self.names
    }
}

/// Runs a test with a fresh registry.
///
/// # Example
///
/// ```rust
/// use uniquename_testkit::with_registry;
///
/// with_registry(|names| {
///     assert!(names.take("djMax", "user1", None).unwrap());
///     assert!(!names.take("djmax", "user2", None).unwrap());
/// });
/// ```
pub fn with_registry<F, R>(f: F) -> R
where
    F: FnOnce(&TestRegistry) -> R,
{
    let registry = TestRegistry::new();
    f(&registry)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a registry where `name-<i>` is held by `owner-<i % owners>`,
    /// with every third claim expiring one second after [`FIXTURE_EPOCH`].
    pub fn populated_registry(count: usize, owners: usize) -> TestRegistry {
        let registry = TestRegistry::new();
        let owners = owners.max(1);

        for i in 0..count {
            let expires_at = (i % 3 == 0).then_some(FIXTURE_EPOCH + 1_000);
            let taken = registry
                .take(&format!("name-{i}"), &format!("owner-{}", i % owners), expires_at)
                .expect("Failed to take name");
            assert!(taken, "fresh name must be free");
        }

        registry
    }

    /// Creates a registry where `name` was claimed by `owner` and has
    /// already expired.
    pub fn expired_claim(name: &str, owner: &str) -> TestRegistry {
        let registry = TestRegistry::new();
        assert!(registry
            .take(name, owner, Some(FIXTURE_EPOCH + 10))
            .expect("Failed to take name"));
        registry.advance_millis(10);
        registry
    }
}
