/// Number of distinct paint states: none, enforcer, blocker and 16 extruder lanes.
pub const STATE_COUNT: usize = 19;

/// Maximum number of extruder lanes a paint state can address.
pub const MAX_EXTRUDERS: u8 = 16;

/// Highest state code that fits the short 2-bit leaf encoding.
pub const MAX_SHORT_STATE: u8 = 2;

/// Escape value of the 2-bit leaf state field, followed by a 4-bit extension.
pub const STATE_ESCAPE: u8 = 0b11;

/// Bits used by the split count and special side fields.
pub const SPLIT_BITS: usize = 2;

/// Bits used by the extended leaf state field.
pub const EXTENDED_STATE_BITS: usize = 4;

/// Tolerance for angle comparisons in seed fill.
pub const ANGLE_EPSILON: f32 = 1e-4;

/// Tolerance for barycentric point-in-triangle tests.
pub const BARYCENTRIC_EPSILON: f32 = 1e-5;
