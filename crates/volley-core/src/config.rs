// Tunables for resolution and trend analysis.

use serde::Deserialize;

/// Minimum similarity score (0-100) for an approximate player match.
pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;

/// Number of trailing games used for "recent" averages and momentum.
pub const DEFAULT_RECENT_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub match_threshold: u8,
    pub recent_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }
}
