//! Runtime Configuration
//!
//! All settings have defaults; a JSON document only needs to name the values
//! it overrides.
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{ "codec": { "max_depth": 64 } }"#)?;
//! assert_eq!(config.codec.max_depth, 64);
//! ```

use serde::{Deserialize, Serialize};

/// Top-level configuration for sessions created by this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub reactive: ReactiveConfig,
    pub codec: CodecLimits,
    pub session: SessionConfig,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON, filling unspecified fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Settings for the reactive graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Maximum effect runs in one propagation pass before it is aborted.
    pub max_flush_iterations: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            max_flush_iterations: 10_000,
        }
    }
}

/// Ceilings enforced by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecLimits {
    /// Longest accepted string or byte payload.
    pub max_string_bytes: u64,
    /// Most patches accepted in one frame.
    pub max_patches: u64,
    /// Most tree nodes accepted in one encoded node payload.
    pub max_nodes: u64,
    /// Deepest accepted nesting of an encoded node payload.
    pub max_depth: u32,
    /// Largest accepted frame.
    pub max_frame_bytes: u64,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_string_bytes: 64 * 1024,
            max_patches: 65_536,
            max_nodes: 100_000,
            max_depth: 256,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Settings for session tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the outbound frame channel created by [`crate::session::SessionRegistry`].
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
        }
    }
}
