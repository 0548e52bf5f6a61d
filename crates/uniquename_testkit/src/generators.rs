//! Property-based test generators using proptest.
//!
//! Names are drawn from a small alphabet with mixed case so that generated
//! operations collide often, both exactly and after case folding.

use proptest::prelude::*;
use std::collections::HashMap;
use uniquename_core::OwnershipRecord;

/// Strategy for names that often collide after case folding.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-cA-C]{1,3}").expect("Invalid regex")
}

/// Strategy for owner ids.
pub fn owner_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["user1", "user2", "user3"]).prop_map(str::to_string)
}

/// Strategy for an expiration relative to now: `None` for a permanent
/// claim, otherwise an offset in milliseconds that may be in the past.
pub fn relative_expiry_strategy() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![
        1 => Just(None),
        3 => (-1_000i64..5_000).prop_map(Some),
    ]
}

/// Resolves a relative expiry against `now`.
pub fn resolve_expiry(now: u64, offset: Option<i64>) -> Option<u64> {
    offset.map(|offset| now.saturating_add_signed(offset))
}

/// A registry operation.
#[derive(Debug, Clone)]
pub enum NameOperation {
    /// Claim a name.
    Take {
        /// Name to claim.
        name: String,
        /// Claiming owner.
        owner: String,
        /// Expiration relative to now.
        expiry: Option<i64>,
    },
    /// Move a name between owners.
    Transfer {
        /// Name to move.
        name: String,
        /// Current owner.
        from: String,
        /// New owner.
        to: String,
        /// Expiration relative to now.
        expiry: Option<i64>,
    },
    /// Delete a name.
    Remove {
        /// Name to delete.
        name: String,
    },
    /// Let time pass.
    Advance {
        /// Milliseconds to move the clock.
        millis: u64,
    },
}

/// Strategy for generating registry operations.
pub fn name_operation_strategy() -> impl Strategy<Value = NameOperation> {
    prop_oneof![
        4 => (name_strategy(), owner_strategy(), relative_expiry_strategy())
            .prop_map(|(name, owner, expiry)| NameOperation::Take { name, owner, expiry }),
        2 => (name_strategy(), owner_strategy(), owner_strategy(), relative_expiry_strategy())
            .prop_map(|(name, from, to, expiry)| NameOperation::Transfer { name, from, to, expiry }),
        1 => name_strategy().prop_map(|name| NameOperation::Remove { name }),
        1 => (1u64..3_000).prop_map(|millis| NameOperation::Advance { millis }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<NameOperation>> {
    prop::collection::vec(name_operation_strategy(), min_ops..max_ops)
}

/// A straightforward in-memory model of the registry's claim rules, for
/// comparing against the real thing.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    records: HashMap<String, OwnershipRecord>,
    strict_transfers: bool,
}

impl ModelRegistry {
    /// Creates an empty model.
    pub fn new(strict_transfers: bool) -> Self {
        Self {
            records: HashMap::new(),
            strict_transfers,
        }
    }

    fn live(record: &OwnershipRecord, now: u64) -> bool {
        record.expires_at.map_or(true, |end| end > now)
    }

    /// Applies a take and returns its result.
    pub fn take(&mut self, name: &str, owner: &str, expires_at: Option<u64>, now: u64) -> bool {
        let key = name.to_lowercase();
        if let Some(record) = self.records.get(&key) {
            if record.owner_id != owner && Self::live(record, now) {
                return false;
            }
            if record.owner_id == owner && record.expires_at == expires_at {
                return true;
            }
        }
        self.records
            .insert(key, OwnershipRecord::new(owner, name, expires_at));
        true
    }

    /// Applies a transfer and returns its result.
    pub fn transfer(
        &mut self,
        name: &str,
        from: &str,
        to: &str,
        expires_at: Option<u64>,
        now: u64,
    ) -> bool {
        let Some(record) = self.records.get_mut(&name.to_lowercase()) else {
            return false;
        };
        if record.owner_id == from {
            if self.strict_transfers && !Self::live(record, now) {
                return false;
            }
            record.owner_id = to.to_string();
            record.expires_at = expires_at;
            return true;
        }
        if record.owner_id != to {
            return false;
        }
        if expires_at.is_some() {
            record.expires_at = expires_at;
        }
        true
    }

    /// Applies a removal.
    pub fn remove(&mut self, name: &str) {
        self.records.remove(&name.to_lowercase());
    }

    /// Returns the stored record for `name`.
    pub fn get(&self, name: &str) -> Option<&OwnershipRecord> {
        self.records.get(&name.to_lowercase())
    }

    /// Returns every record in canonical name order.
    pub fn entries(&self) -> Vec<OwnershipRecord> {
        let mut keys: Vec<_> = self.records.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| self.records[key].clone())
            .collect()
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
