//! Registry configuration.

use crate::canonical::Canonicalizer;
use crate::clock::{Clock, SystemClock};
use std::sync::Arc;
use uniquename_store::RetryPolicy;

/// Directory used when none is configured.
pub const DEFAULT_DIRECTORY: &str = "uniquenames";

/// Configuration for a [`crate::UniqueNames`] registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory path whose prefix isolates this registry's keys.
    pub directory: Vec<String>,

    /// Function mapping raw names to their comparison form.
    pub canonicalizer: Canonicalizer,

    /// Conflict-retry policy for every transaction the registry runs.
    pub retry: RetryPolicy,

    /// Time source for expiration checks.
    pub clock: Arc<dyn Clock>,

    /// Whether a transfer from an owner whose claim has expired is refused.
    pub strict_transfers: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            directory: vec![DEFAULT_DIRECTORY.to_string()],
            canonicalizer: Canonicalizer::default(),
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            strict_transfers: false,
        }
    }
}

impl RegistryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a single-segment directory.
    #[must_use]
    pub fn directory(mut self, name: impl Into<String>) -> Self {
        self.directory = vec![name.into()];
        self
    }

    /// Uses a nested directory path.
    #[must_use]
    pub fn directory_path<I, P>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.directory = path.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the canonicalizer.
    #[must_use]
    pub fn canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets whether transfers from expired owners are refused.
    #[must_use]
    pub const fn strict_transfers(mut self, value: bool) -> Self {
        self.strict_transfers = value;
        self
    }

    /// Returns the directory path joined with `/`.
    #[must_use]
    pub fn directory_display(&self) -> String {
        self.directory.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.directory, vec!["uniquenames".to_string()]);
        assert_eq!(config.canonicalizer.canonicalize("MAX"), "max");
        assert!(!config.strict_transfers);
    }

    #[test]
    fn builder_pattern() {
        let config = RegistryConfig::new()
            .directory_path(["apps", "chat"])
            .canonicalizer(Canonicalizer::identity())
            .retry(RetryPolicy::no_retry())
            .clock(Arc::new(ManualClock::new(42)))
            .strict_transfers(true);

        assert_eq!(config.directory_display(), "apps/chat");
        assert_eq!(config.canonicalizer.canonicalize("MAX"), "MAX");
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.clock.now_millis(), 42);
        assert!(config.strict_transfers);
    }
}
