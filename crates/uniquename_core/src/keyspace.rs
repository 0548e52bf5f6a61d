//! Mapping from names to store keys.

use crate::canonical::Canonicalizer;
use uniquename_store::{Element, Subspace};

/// Tuple tag that marks name keys inside the registry directory.
pub const NAME_TAG: &str = "nm";

/// Builds keys for names under the registry's directory prefix.
///
/// ```text
/// <directory prefix> pack("nm", canonicalize(name)) -> OwnershipRecord
/// ```
#[derive(Debug, Clone)]
pub struct NameKeySpace {
    root: Subspace,
    names: Subspace,
    canonicalizer: Canonicalizer,
}

impl NameKeySpace {
    /// Creates a key space rooted at a directory subspace.
    #[must_use]
    pub fn new(root: Subspace, canonicalizer: Canonicalizer) -> Self {
        let names = root.subspace(&[Element::from(NAME_TAG)]);
        Self {
            root,
            names,
            canonicalizer,
        }
    }

    /// Returns the directory subspace.
    #[must_use]
    pub fn root(&self) -> &Subspace {
        &self.root
    }

    /// Returns the store key for `name`.
    #[must_use]
    pub fn key_for(&self, name: &str) -> Vec<u8> {
        self.names
            .pack(&[Element::from(self.canonicalizer.canonicalize(name))])
    }

    /// Returns the `[begin, end)` range covering every name key.
    #[must_use]
    pub fn names_range(&self) -> (Vec<u8>, Vec<u8>) {
        self.names.range()
    }

    /// Recovers the canonical name from a key built by [`Self::key_for`].
    #[must_use]
    pub fn canonical_name_of(&self, key: &[u8]) -> Option<String> {
        match self.names.unpack(key).ok()?.as_slice() {
            [element] => element.as_str().map(str::to_string),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> NameKeySpace {
        NameKeySpace::new(
            Subspace::from_bytes(vec![0x15, 0x01]),
            Canonicalizer::default(),
        )
    }

    #[test]
    fn keys_fold_case() {
        let keys = space();
        assert_eq!(keys.key_for("DJMax"), keys.key_for("djmax"));
        assert_ne!(keys.key_for("djmax"), keys.key_for("djmin"));
    }

    #[test]
    fn keys_live_under_the_directory() {
        let keys = space();
        let key = keys.key_for("djMax");
        assert!(keys.root().contains(&key));
        assert_eq!(keys.canonical_name_of(&key).as_deref(), Some("djmax"));

        let (begin, end) = keys.names_range();
        assert!(begin < key && key < end);
    }

    #[test]
    fn foreign_key_has_no_name() {
        let keys = space();
        assert_eq!(keys.canonical_name_of(b"\x15\x02other"), None);
        assert_eq!(
            keys.canonical_name_of(&keys.root().pack(&["nm".into(), 7u64.into()])),
            None
        );
    }
}
