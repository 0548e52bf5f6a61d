//! Directory layer: named, isolated key prefixes.
//!
//! A directory maps a human-readable path such as `["uniquenames"]` to a short
//! allocated byte prefix. Everything an application writes lives under that
//! prefix, so unrelated users of one store never collide and a whole
//! directory can be removed with a single range clear.
//!
//! ```text
//! 0xFE ("path", <segment>...)  -> allocated prefix
//! 0xFE ("alloc",)              -> next allocation counter (u64 BE)
//! <prefix> ...                 -> directory contents
//! ```
//!
//! Prefixes are packed tuple integers (`0x15 0x01`, `0x15 0x02`, ...), which
//! can never start with the node prefix byte.

use crate::error::{StoreError, StoreResult};
use crate::retry::RetryPolicy;
use crate::store::{KvStore, KvTransaction};
use crate::tuple::{self, Element};
use tracing::debug;

/// First byte of every directory metadata key.
pub const DEFAULT_NODE_PREFIX: u8 = 0xFE;

/// A key prefix with tuple packing helpers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// Creates a subspace from raw prefix bytes.
    #[must_use]
    pub fn from_bytes(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the raw prefix.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Packs a tuple under this prefix.
    #[must_use]
    pub fn pack(&self, elements: &[Element]) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(&tuple::pack(elements));
        key
    }

    /// Unpacks a key produced by [`Subspace::pack`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if the key is outside this subspace
    /// or its suffix is not a valid tuple.
    pub fn unpack(&self, key: &[u8]) -> StoreResult<Vec<Element>> {
        let suffix = key
            .strip_prefix(self.prefix.as_slice())
            .ok_or_else(|| StoreError::invalid_key("key is outside the subspace"))?;
        tuple::unpack(suffix)
    }

    /// Returns a nested subspace.
    #[must_use]
    pub fn subspace(&self, elements: &[Element]) -> Subspace {
        Subspace::from_bytes(self.pack(elements))
    }

    /// Returns true if `key` lies under this prefix.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Returns the `[begin, end)` range covering every packed key.
    #[must_use]
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let mut begin = self.prefix.clone();
        begin.push(0x00);
        let mut end = self.prefix.clone();
        end.push(0xFF);
        (begin, end)
    }
}

/// Allocates and resolves directory prefixes.
#[derive(Debug, Clone)]
pub struct DirectoryLayer {
    nodes: Subspace,
}

impl Default for DirectoryLayer {
    fn default() -> Self {
        Self {
            nodes: Subspace::from_bytes(vec![DEFAULT_NODE_PREFIX]),
        }
    }
}

impl DirectoryLayer {
    /// Creates a directory layer using the default node prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn node_key(&self, path: &[String]) -> Vec<u8> {
        let mut elements = Vec::with_capacity(path.len() + 1);
        elements.push(Element::from("path"));
        elements.extend(path.iter().map(|segment| Element::from(segment.as_str())));
        self.nodes.pack(&elements)
    }

    fn allocator_key(&self) -> Vec<u8> {
        self.nodes.pack(&[Element::from("alloc")])
    }

    fn validate(path: &[String]) -> StoreResult<()> {
        if path.is_empty() || path.iter().any(String::is_empty) {
            return Err(StoreError::invalid_operation(
                "directory path must have at least one non-empty segment",
            ));
        }
        Ok(())
    }

    /// Opens a directory, creating it first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or the store fails.
    pub fn create_or_open<S: KvStore>(
        &self,
        store: &S,
        policy: &RetryPolicy,
        path: &[String],
    ) -> StoreResult<Subspace> {
        Self::validate(path)?;
        store.transact(policy, |txn| self.create_or_open_in(txn, path))
    }

    /// Opens or creates a directory inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty, the allocation counter is
    /// corrupt, or the store fails.
    pub fn create_or_open_in<T: KvTransaction>(
        &self,
        txn: &mut T,
        path: &[String],
    ) -> StoreResult<Subspace> {
        Self::validate(path)?;
        let node_key = self.node_key(path);

        if let Some(prefix) = txn.get(&node_key)? {
            return Ok(Subspace::from_bytes(prefix));
        }

        let allocator_key = self.allocator_key();
        let next = match txn.get(&allocator_key)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::invalid_operation("directory allocation counter is corrupt")
                })?;
                u64::from_be_bytes(raw)
            }
            None => 1,
        };
        txn.set(&allocator_key, &(next + 1).to_be_bytes())?;

        let prefix = tuple::pack(&[Element::Int(next)]);
        txn.set(&node_key, &prefix)?;
        debug!(path = %path.join("/"), prefix = %tuple::printable(&prefix), "allocated directory");

        Ok(Subspace::from_bytes(prefix))
    }

    /// Opens an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DirectoryNotFound`] if the directory was never
    /// created.
    pub fn open<S: KvStore>(
        &self,
        store: &S,
        policy: &RetryPolicy,
        path: &[String],
    ) -> StoreResult<Subspace> {
        Self::validate(path)?;
        let node_key = self.node_key(path);
        store.transact(policy, |txn| match txn.get(&node_key)? {
            Some(prefix) => Ok(Subspace::from_bytes(prefix)),
            None => Err(StoreError::DirectoryNotFound {
                path: path.join("/"),
            }),
        })
    }

    /// Removes a directory and everything stored under it.
    ///
    /// Returns `false` if the directory did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove_if_exists<S: KvStore>(
        &self,
        store: &S,
        policy: &RetryPolicy,
        path: &[String],
    ) -> StoreResult<bool> {
        Self::validate(path)?;
        let node_key = self.node_key(path);
        store.transact(policy, |txn| {
            let Some(prefix) = txn.get(&node_key)? else {
                return Ok(false);
            };
            let (begin, end) = Subspace::from_bytes(prefix).range();
            txn.clear_range(&begin, &end)?;
            txn.clear(&node_key)?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_or_open_is_stable() {
        let store = MemoryStore::new();
        let layer = DirectoryLayer::new();
        let policy = RetryPolicy::default();

        let first = layer
            .create_or_open(&store, &policy, &path(&["uniquenames"]))
            .unwrap();
        let again = layer
            .create_or_open(&store, &policy, &path(&["uniquenames"]))
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(first.prefix(), &[0x15, 0x01]);
    }

    #[test]
    fn distinct_paths_get_distinct_prefixes() {
        let store = MemoryStore::new();
        let layer = DirectoryLayer::new();
        let policy = RetryPolicy::default();

        let a = layer.create_or_open(&store, &policy, &path(&["a"])).unwrap();
        let b = layer
            .create_or_open(&store, &policy, &path(&["a", "b"]))
            .unwrap();
        assert_ne!(a.prefix(), b.prefix());
        assert!(!a.contains(&b.pack(&["x".into()])));
    }

    #[test]
    fn open_missing_directory_fails() {
        let store = MemoryStore::new();
        let err = DirectoryLayer::new()
            .open(&store, &RetryPolicy::default(), &path(&["missing"]))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::DirectoryNotFound {
                path: "missing".into()
            }
        );
    }

    #[test]
    fn empty_path_is_rejected() {
        let store = MemoryStore::new();
        let layer = DirectoryLayer::new();
        assert!(layer
            .create_or_open(&store, &RetryPolicy::default(), &[])
            .is_err());
        assert!(layer
            .create_or_open(&store, &RetryPolicy::default(), &path(&[""]))
            .is_err());
    }

    #[test]
    fn remove_clears_contents() {
        let store = MemoryStore::new();
        let layer = DirectoryLayer::new();
        let policy = RetryPolicy::default();
        let dir = path(&["test-names"]);

        let space = layer.create_or_open(&store, &policy, &dir).unwrap();
        store
            .transact(&policy, |txn| -> StoreResult<()> {
                txn.set(&space.pack(&["nm".into(), "djmax".into()]), b"owner")
            })
            .unwrap();

        assert!(layer.remove_if_exists(&store, &policy, &dir).unwrap());
        assert!(!layer.remove_if_exists(&store, &policy, &dir).unwrap());
        assert!(layer.open(&store, &policy, &dir).is_err());
        // only the allocation counter remains
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn subspace_pack_unpack() {
        let space = Subspace::from_bytes(vec![0x15, 0x07]);
        let key = space.pack(&["nm".into(), "max".into()]);
        assert!(space.contains(&key));
        assert_eq!(
            space.unpack(&key).unwrap(),
            vec![Element::from("nm"), Element::from("max")]
        );
        assert!(space.unpack(b"elsewhere").is_err());

        let (begin, end) = space.range();
        assert!(begin < key && key < end);
    }
}
