use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_EXTRUDERS, MAX_SHORT_STATE, STATE_COUNT};
use crate::error::SelectorError;

/// Paint value carried by a leaf triangle
///
/// Codes 0..=2 are none/enforcer/blocker, codes 3..=18 address extruder
/// lanes 1..=16.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct PaintState(u8);

impl PaintState {
    pub const NONE: PaintState = PaintState(0);
    pub const ENFORCER: PaintState = PaintState(1);
    pub const BLOCKER: PaintState = PaintState(2);
    /// Highest representable state (extruder 16).
    pub const MAX: PaintState = PaintState(MAX_SHORT_STATE + MAX_EXTRUDERS);

    /// State for extruder lane `n` (1-based).
    ///
    /// # Panics
    /// Panics if `n` is not in `1..=16`.
    pub const fn extruder(n: u8) -> Self {
        assert!(n >= 1 && n <= MAX_EXTRUDERS, "extruder lane out of range");
        PaintState(MAX_SHORT_STATE + n)
    }

    /// Build a state from its raw code, `None` for codes above [`PaintState::MAX`].
    pub fn from_code(code: u8) -> Option<Self> {
        (code <= Self::MAX.0).then_some(PaintState(code))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    /// Index into per-state tables of size [`STATE_COUNT`].
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Extruder lane (1-based) if this is a per-extruder state.
    pub fn extruder_lane(self) -> Option<u8> {
        (self.0 > MAX_SHORT_STATE).then(|| self.0 - MAX_SHORT_STATE)
    }

    /// Whether this state needs the escaped 4-bit encoding.
    pub fn is_extended(self) -> bool {
        self.0 > MAX_SHORT_STATE
    }

    /// Iterate over every representable state.
    pub fn all() -> impl Iterator<Item = PaintState> {
        (0..STATE_COUNT as u8).map(PaintState)
    }
}

impl TryFrom<u8> for PaintState {
    type Error = SelectorError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(SelectorError::StateOutOfRange {
            code,
            max: Self::MAX.0,
        })
    }
}

impl From<PaintState> for u8 {
    fn from(state: PaintState) -> u8 {
        state.0
    }
}

/// Clipping plane in mesh coordinates
///
/// A point is clipped when its signed distance along `normal` exceeds `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClippingPlane {
    pub normal: Vec3,
    pub offset: f32,
}

impl ClippingPlane {
    pub fn new(normal: Vec3, offset: f32) -> Self {
        Self { normal, offset }
    }

    pub fn is_mesh_point_clipped(&self, point: Vec3) -> bool {
        self.normal.dot(point) - self.offset > 0.0
    }
}

/// Restricts painting to faces whose normal points within an angle of "down"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverhangFilter {
    down: Vec3,
    cos_limit: f32,
}

impl OverhangFilter {
    /// Build a filter for an instance with the given rotation/scale part.
    ///
    /// # Arguments
    /// * `instance_linear` - Linear part of the mesh-to-world transform
    /// * `angle_deg` - Maximum angle between a face normal and world -Z
    pub fn new(instance_linear: Mat3, angle_deg: f32) -> Self {
        let down = (instance_linear.inverse() * Vec3::NEG_Z).normalize_or_zero();
        Self {
            down,
            cos_limit: angle_deg.to_radians().cos(),
        }
    }

    /// Whether a mesh-space face normal passes the filter.
    pub fn accepts(&self, normal: Vec3) -> bool {
        self.down.dot(normal) >= self.cos_limit
    }
}

/// Indexed triangle mesh: shared vertex positions plus CCW faces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedTriangleSet {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
}

impl IndexedTriangleSet {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Corner positions of face `face`.
    pub fn triangle(&self, face: usize) -> [Vec3; 3] {
        self.indices[face].map(|i| self.vertices[i as usize])
    }

    /// Unit normal of every face (zero for degenerate faces).
    pub fn face_normals(&self) -> Vec<Vec3> {
        (0..self.indices.len())
            .map(|face| {
                let [a, b, c] = self.triangle(face);
                (b - a).cross(c - a).normalize_or_zero()
            })
            .collect()
    }

    /// Total surface area.
    pub fn area(&self) -> f32 {
        (0..self.indices.len())
            .map(|face| {
                let [a, b, c] = self.triangle(face);
                0.5 * (b - a).cross(c - a).length()
            })
            .sum()
    }

    /// Raw vertex buffer view (tightly packed `[f32; 3]`).
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw index buffer view (tightly packed `[u32; 3]`).
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
