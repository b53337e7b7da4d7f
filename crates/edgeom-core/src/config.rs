// ── Runtime adapter configuration ──
//
// Tuning knobs for the adapter and the refresher. Never touches disk:
// the config crate builds an `AdapterConfig` and hands it in.

use std::time::Duration;

/// Runtime tuning for an [`Adapter`](crate::Adapter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// NOT_EXIST messages that are not logged when they come from a
    /// collection-level query. Matched as substrings.
    pub benign_not_found: Vec<String>,
    /// Capacity of the change-event broadcast channel.
    pub event_capacity: usize,
    /// Pause between per-item fetches of a list refresh.
    pub refresh_item_pause: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            benign_not_found: vec!["Session not found.".into()],
            event_capacity: 256,
            refresh_item_pause: Duration::from_millis(100),
        }
    }
}

impl AdapterConfig {
    pub(crate) fn is_benign(&self, message: &str) -> bool {
        self.benign_not_found
            .iter()
            .any(|pattern| !pattern.is_empty() && message.contains(pattern.as_str()))
    }
}
