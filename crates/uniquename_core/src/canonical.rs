//! Name canonicalization.

use std::fmt;
use std::sync::Arc;

/// Maps a raw name to the form used for comparison and keys.
///
/// Canonicalization must be pure and deterministic. It does not have to be
/// reversible; the raw name is kept in the ownership record for display.
#[derive(Clone)]
pub struct Canonicalizer {
    label: &'static str,
    func: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl Canonicalizer {
    /// Wraps a custom canonicalization function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            label: "custom",
            func: Arc::new(func),
        }
    }

    /// Case-folds names. This is the default.
    #[must_use]
    pub fn lowercase() -> Self {
        Self {
            label: "lowercase",
            func: Arc::new(str::to_lowercase),
        }
    }

    /// Leaves names untouched.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            label: "identity",
            func: Arc::new(str::to_string),
        }
    }

    /// Canonicalizes a name.
    #[must_use]
    pub fn canonicalize(&self, name: &str) -> String {
        (self.func)(name)
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::lowercase()
    }
}

impl fmt::Debug for Canonicalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Canonicalizer({})", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_folds_case() {
        let c = Canonicalizer::default();
        assert_eq!(c.canonicalize("DJMax"), "djmax");
        assert_eq!(c.canonicalize("ÉCOLE"), "école");
    }

    #[test]
    fn identity_keeps_name() {
        assert_eq!(Canonicalizer::identity().canonicalize("DJMax"), "DJMax");
    }

    #[test]
    fn custom_function() {
        let c = Canonicalizer::new(|name| name.trim().to_lowercase());
        assert_eq!(c.canonicalize("  Max "), "max");
        assert_eq!(format!("{c:?}"), "Canonicalizer(custom)");
    }
}
