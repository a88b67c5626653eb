//! Shared configuration for the facet paint selector
//!
//! This crate holds the tunables every consumer of the selector core agrees on:
//! how fine triangles are split under a brush, when the arena is compacted,
//! the default seed-fill tolerance and how many extruder lanes are supported.

use serde::{Deserialize, Serialize};

/// Default divisor applied to the cursor feature size to get the split edge limit
pub const DEFAULT_EDGE_LIMIT_DIVISOR: f32 = 5.0;

/// Edge limit used before any cursor has been applied (mesh units)
pub const DEFAULT_INITIAL_EDGE_LIMIT: f32 = 0.6;

/// Fraction of reclaimed triangle slots that triggers garbage collection
pub const DEFAULT_GC_INVALID_RATIO: f32 = 0.5;

/// Default dihedral tolerance for seed fill, in degrees
pub const DEFAULT_SEED_FILL_ANGLE_DEG: f32 = 30.0;

/// Number of per-extruder paint lanes supported by default
pub const DEFAULT_EXTRUDER_COUNT: u8 = 16;

/// Upper bound for [`SelectorConfig::extruder_count`]
pub const MAX_EXTRUDER_COUNT: u8 = 16;

/// How the maximum edge length of split triangles is derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeLimit {
    /// Edge limit follows the cursor: `feature_size / divisor`.
    CursorRelative { divisor: f32 },
    /// Edge limit is a fixed length, independent of the cursor.
    Fixed { length: f32 },
}

impl Default for EdgeLimit {
    fn default() -> Self {
        Self::CursorRelative {
            divisor: DEFAULT_EDGE_LIMIT_DIVISOR,
        }
    }
}

impl EdgeLimit {
    /// Resolve the edge limit for a cursor with the given feature size.
    ///
    /// A non-positive divisor falls back to the default one.
    pub fn resolve(&self, feature_size: f32) -> f32 {
        match *self {
            EdgeLimit::CursorRelative { divisor } => {
                let divisor = if divisor > 0.0 {
                    divisor
                } else {
                    DEFAULT_EDGE_LIMIT_DIVISOR
                };
                feature_size / divisor
            }
            EdgeLimit::Fixed { length } => length,
        }
    }
}

/// Selector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Policy for the split edge limit
    pub edge_limit: EdgeLimit,
    /// Edge limit in effect before the first brush stroke
    pub initial_edge_limit: f32,
    /// Garbage collection runs once reclaimed slots exceed this share of all slots
    pub gc_invalid_ratio: f32,
    /// Seed fill angle in degrees; negative disables the limit
    pub seed_fill_angle_deg: f32,
    /// Number of extruder lanes the host supports
    pub extruder_count: u8,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            edge_limit: EdgeLimit::default(),
            initial_edge_limit: DEFAULT_INITIAL_EDGE_LIMIT,
            gc_invalid_ratio: DEFAULT_GC_INVALID_RATIO,
            seed_fill_angle_deg: DEFAULT_SEED_FILL_ANGLE_DEG,
            extruder_count: DEFAULT_EXTRUDER_COUNT,
        }
    }
}

impl SelectorConfig {
    /// Create a config that splits down to a fixed edge length
    pub fn with_fixed_edge_limit(length: f32) -> Self {
        Self {
            edge_limit: EdgeLimit::Fixed { length },
            initial_edge_limit: length,
            ..Self::default()
        }
    }

    /// Extruder count clamped to the supported range
    pub fn extruder_lanes(&self) -> u8 {
        self.extruder_count.min(MAX_EXTRUDER_COUNT)
    }

    /// Seed fill angle, or `None` when the limit is disabled
    pub fn seed_fill_angle(&self) -> Option<f32> {
        (self.seed_fill_angle_deg >= 0.0).then_some(self.seed_fill_angle_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SelectorConfig::default();
        assert_eq!(config.initial_edge_limit, DEFAULT_INITIAL_EDGE_LIMIT);
        assert_eq!(config.gc_invalid_ratio, DEFAULT_GC_INVALID_RATIO);
        assert_eq!(config.extruder_lanes(), 16);
        assert_eq!(config.seed_fill_angle(), Some(30.0));
    }

    #[test]
    fn test_edge_limit_resolve() {
        let relative = EdgeLimit::default();
        assert!((relative.resolve(2.0) - 0.4).abs() < 1e-6);

        let fixed = EdgeLimit::Fixed { length: 0.8 };
        assert_eq!(fixed.resolve(123.0), 0.8);

        let broken = EdgeLimit::CursorRelative { divisor: 0.0 };
        assert!((broken.resolve(1.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_negative_angle_disables_limit() {
        let config = SelectorConfig {
            seed_fill_angle_deg: -1.0,
            ..SelectorConfig::default()
        };
        assert_eq!(config.seed_fill_angle(), None);
    }

    #[test]
    fn test_extruder_count_clamped() {
        let config = SelectorConfig {
            extruder_count: 40,
            ..SelectorConfig::default()
        };
        assert_eq!(config.extruder_lanes(), MAX_EXTRUDER_COUNT);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "edge_limit": { "kind": "fixed", "length": 0.25 }, "extruder_count": 4 }"#;
        let config: SelectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.edge_limit, EdgeLimit::Fixed { length: 0.25 });
        assert_eq!(config.extruder_count, 4);
        assert_eq!(config.gc_invalid_ratio, DEFAULT_GC_INVALID_RATIO);

        let back = serde_json::to_string(&config).unwrap();
        let again: SelectorConfig = serde_json::from_str(&back).unwrap();
        assert_eq!(again, config);
    }
}
