//! Decision rules for claims and transfers.
//!
//! These functions see only the current record and the request, and return
//! what the transaction should do. They never touch the store, so the
//! registry can re-run them on every retry.

use crate::record::OwnershipRecord;

/// Outcome of evaluating a request against the current record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Succeed and store this record.
    Write(OwnershipRecord),
    /// Succeed without writing.
    Keep,
    /// Fail without writing.
    Reject,
}

impl Decision {
    /// Returns the boolean reported to the caller.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !matches!(self, Decision::Reject)
    }

    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Write(_) => "write",
            Decision::Keep => "keep",
            Decision::Reject => "reject",
        }
    }
}

/// Decides a `take` of `name` by `owner_id`.
///
/// | current record              | decision                           |
/// |-----------------------------|------------------------------------|
/// | none                        | write new record                   |
/// | same owner, same expiration | keep                               |
/// | same owner, new expiration  | write new record                   |
/// | other owner, live           | reject                             |
/// | other owner, expired        | write new record                   |
#[must_use]
pub fn decide_take(
    current: Option<&OwnershipRecord>,
    name: &str,
    owner_id: &str,
    expires_at: Option<u64>,
    now_millis: u64,
) -> Decision {
    let fresh = || Decision::Write(OwnershipRecord::new(owner_id, name, expires_at));

    match current {
        None => fresh(),
        Some(record) if record.is_owned_by(owner_id) => {
            if record.expires_at == expires_at {
                Decision::Keep
            } else {
                fresh()
            }
        }
        Some(record) if record.is_expired_at(now_millis) => fresh(),
        Some(_) => Decision::Reject,
    }
}

/// Decides a transfer of the current record from `from` to `to`.
///
/// When the record already belongs to `to`, only a supplied expiration that
/// differs from the stored one is written; `None` keeps the stored value.
///
/// Expiration is only consulted when `strict` is set, in which case a record
/// held by `from` that has already expired cannot be transferred.
#[must_use]
pub fn decide_transfer(
    current: Option<&OwnershipRecord>,
    from: &str,
    to: &str,
    expires_at: Option<u64>,
    now_millis: u64,
    strict: bool,
) -> Decision {
    let Some(record) = current else {
        return Decision::Reject;
    };

    if record.is_owned_by(from) {
        if strict && record.is_expired_at(now_millis) {
            return Decision::Reject;
        }
        return Decision::Write(OwnershipRecord::new(to, record.raw_name.clone(), expires_at));
    }

    if record.is_owned_by(to) {
        // a repeat without an expiration leaves the current one in place
        if matches!(expires_at, Some(end) if record.expires_at != Some(end)) {
            return Decision::Write(OwnershipRecord::new(to, record.raw_name.clone(), expires_at));
        }
        return Decision::Keep;
    }

    Decision::Reject
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NOW: u64 = 1_000_000;

    fn held(owner: &str, expires_at: Option<u64>) -> OwnershipRecord {
        OwnershipRecord::new(owner, "djMax", expires_at)
    }

    #[test]
    fn take_free_name() {
        let d = decide_take(None, "djMax", "user1", None, NOW);
        assert_eq!(d, Decision::Write(held("user1", None)));
    }

    #[test]
    fn take_own_name_without_change_keeps() {
        let current = held("user1", Some(NOW + 10));
        assert_eq!(
            decide_take(Some(&current), "djmax", "user1", Some(NOW + 10), NOW),
            Decision::Keep
        );
        let permanent = held("user1", None);
        assert_eq!(
            decide_take(Some(&permanent), "djMax", "user1", None, NOW),
            Decision::Keep
        );
    }

    #[test]
    fn take_own_name_with_new_expiration_rewrites() {
        let current = held("user1", Some(NOW + 10));
        assert_eq!(
            decide_take(Some(&current), "DJMAX", "user1", Some(NOW + 20), NOW),
            Decision::Write(OwnershipRecord::new("user1", "DJMAX", Some(NOW + 20)))
        );
        assert_eq!(
            decide_take(Some(&current), "djMax", "user1", None, NOW),
            Decision::Write(held("user1", None))
        );
    }

    #[test]
    fn take_own_expired_name_succeeds() {
        let current = held("user1", Some(NOW - 1));
        assert!(decide_take(Some(&current), "djMax", "user1", Some(NOW - 1), NOW).succeeded());
    }

    #[test]
    fn take_live_name_of_other_owner_is_rejected() {
        for expires_at in [None, Some(NOW + 1)] {
            let current = held("user1", expires_at);
            assert_eq!(
                decide_take(Some(&current), "djMax", "user2", None, NOW),
                Decision::Reject
            );
        }
    }

    #[test]
    fn take_expired_name_of_other_owner() {
        // expiration equal to now counts as expired
        let current = held("user1", Some(NOW));
        assert_eq!(
            decide_take(Some(&current), "djMax", "user2", Some(NOW + 5), NOW),
            Decision::Write(held("user2", Some(NOW + 5)))
        );
    }

    #[test]
    fn transfer_missing_name_is_rejected() {
        assert_eq!(
            decide_transfer(None, "user1", "user2", None, NOW, false),
            Decision::Reject
        );
    }

    #[test]
    fn transfer_from_current_owner() {
        let current = held("user1", Some(NOW + 10));
        assert_eq!(
            decide_transfer(Some(&current), "user1", "user2", None, NOW, false),
            Decision::Write(held("user2", None))
        );
    }

    #[test]
    fn transfer_already_completed() {
        let current = held("user2", Some(NOW + 10));
        assert_eq!(
            decide_transfer(Some(&current), "user1", "user2", Some(NOW + 10), NOW, false),
            Decision::Keep
        );
        assert_eq!(
            decide_transfer(Some(&current), "user1", "user2", Some(NOW + 20), NOW, false),
            Decision::Write(held("user2", Some(NOW + 20)))
        );
    }

    #[test]
    fn repeated_transfer_without_expiration_keeps_lease() {
        let current = held("user2", Some(NOW + 10));
        assert_eq!(
            decide_transfer(Some(&current), "user1", "user2", None, NOW, false),
            Decision::Keep
        );
        let permanent = held("user2", None);
        assert_eq!(
            decide_transfer(Some(&permanent), "user1", "user2", Some(NOW + 5), NOW, false),
            Decision::Write(held("user2", Some(NOW + 5)))
        );
    }

    #[test]
    fn transfer_by_stranger_is_rejected() {
        let current = held("user3", None);
        assert_eq!(
            decide_transfer(Some(&current), "user1", "user2", None, NOW, false),
            Decision::Reject
        );
    }

    #[test]
    fn transfer_from_expired_owner_current_behavior() {
        let current = held("user1", Some(NOW - 1));
        assert!(decide_transfer(Some(&current), "user1", "user2", None, NOW, false).succeeded());
    }

    #[test]
    fn transfer_from_expired_owner_strict_alternative() {
        let current = held("user1", Some(NOW - 1));
        assert_eq!(
            decide_transfer(Some(&current), "user1", "user2", None, NOW, true),
            Decision::Reject
        );
        let live = held("user1", Some(NOW + 1));
        assert!(decide_transfer(Some(&live), "user1", "user2", None, NOW, true).succeeded());
    }

    fn record_strategy() -> impl Strategy<Value = OwnershipRecord> {
        (
            prop::sample::select(vec!["user1", "user2", "user3"]),
            prop::option::of(NOW - 1_000..NOW + 1_000),
        )
            .prop_map(|(owner, expires_at)| OwnershipRecord::new(owner, "djMax", expires_at))
    }

    proptest! {
        #[test]
        fn holder_is_never_rejected(
            current in record_strategy(),
            expires_at in prop::option::of(NOW - 1_000..NOW + 1_000),
        ) {
            let owner = current.owner_id.clone();
            prop_assert!(decide_take(Some(&current), "djMax", &owner, expires_at, NOW).succeeded());
        }

        #[test]
        fn take_outcome_depends_on_liveness(
            current in record_strategy(),
            owner in prop::sample::select(vec!["user1", "user2", "user3"]),
        ) {
            let decision = decide_take(Some(&current), "djMax", owner, None, NOW);
            let expected = current.is_owned_by(owner) || current.is_expired_at(NOW);
            prop_assert_eq!(decision.succeeded(), expected);
            if !expected {
                prop_assert_eq!(decision, Decision::Reject);
            }
        }

        #[test]
        fn transfer_lands_on_target(
            current in record_strategy(),
            from in prop::sample::select(vec!["user1", "user2", "user3"]),
            to in prop::sample::select(vec!["user1", "user2", "user3"]),
            strict in any::<bool>(),
        ) {
            match decide_transfer(Some(&current), from, to, None, NOW, strict) {
                Decision::Write(record) => {
                    prop_assert_eq!(record.owner_id, to);
                    prop_assert_eq!(record.raw_name, current.raw_name);
                }
                Decision::Keep => {
                    prop_assert!(current.is_owned_by(to));
                    prop_assert!(!current.is_owned_by(from));
                }
                Decision::Reject => prop_assert!(
                    !(current.is_owned_by(from) || current.is_owned_by(to))
                        || (strict && current.is_expired_at(NOW))
                ),
            }
        }
    }
}
