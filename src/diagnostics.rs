//! Caller-visible advisory notices.
//!
//! Server-side deprecations and capability downgrades are warnings, not
//! errors. Instead of a process-global warning filter, every client carries
//! an explicit [`Diagnostics`] policy chosen at construction. The default
//! forwards to `tracing::warn!`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// What to do with advisory notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningPolicy {
    /// Emit through `tracing::warn!`.
    #[default]
    Log,
    /// Buffer for later inspection via [`Diagnostics::drain`].
    Collect,
    /// Drop silently.
    Silent,
}

/// Shared advisory-notice sink. Cloning shares the underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    policy: WarningPolicy,
    collected: Arc<Mutex<Vec<String>>>,
}

impl Diagnostics {
    pub fn new(policy: WarningPolicy) -> Self {
        Self { policy, collected: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn policy(&self) -> WarningPolicy {
        self.policy
    }

    /// Emit an advisory notice according to the configured policy.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        match self.policy {
            WarningPolicy::Log => warn!(target: "gds_rs", "{message}"),
            WarningPolicy::Collect => self.collected.lock().push(message),
            WarningPolicy::Silent => {}
        }
    }

    /// Re-emit a server-side endpoint deprecation.
    pub fn deprecation(&self, old_endpoint: &str, new_endpoint: &str) {
        self.warn(format!(
            "The endpoint '{old_endpoint}' is deprecated. Please use '{new_endpoint}' instead."
        ));
    }

    /// Take all buffered notices (Collect policy only; empty otherwise).
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.collected.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_policy_buffers_notices() {
        let diags = Diagnostics::new(WarningPolicy::Collect);
        diags.warn("first");
        diags.deprecation("gds.graph.streamNodeProperty", "gds.graph.nodeProperty.stream");

        let notices = diags.drain();
        assert_eq!(notices.len(), 2);
        assert!(notices[1].contains("gds.graph.nodeProperty.stream"));
        assert!(diags.drain().is_empty());
    }

    #[test]
    fn clones_share_the_buffer() {
        let diags = Diagnostics::new(WarningPolicy::Collect);
        let clone = diags.clone();
        clone.warn("from clone");
        assert_eq!(diags.drain().len(), 1);
    }
}
