//! Brush cursors used to paint triangles.
//!
//! A cursor is one of a closed set of shapes. Each shape tests mesh points,
//! triangle edges and facet visibility against itself; the selector only
//! talks to the [`CursorShape`] trait.
//!
//! When the mesh instance is uniformly scaled, tests run in mesh space and
//! the radius is converted from world units. Otherwise the cursor is moved
//! to world space and every mesh point is transformed before testing.

use glam::{Affine3A, Mat3, Vec3};

use crate::geometry::{
    closest_point_on_segment, line_crosses_triangle, project_onto_plane,
    segment_intersects_capsule, segment_intersects_sphere,
};
use crate::types::ClippingPlane;

/// Relative tolerance used when deciding whether a transform scales uniformly
const UNIFORM_SCALE_TOLERANCE: f32 = 1e-4;

/// Placement of a cursor relative to the painted mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorFrame {
    /// Mesh-to-world transform of the painted instance
    pub trafo: Affine3A,
    /// Whether `trafo` scales all axes equally (tests then stay in mesh space)
    pub uniform_scaling: bool,
    normal_matrix: Mat3,
    /// Optional clipping plane in mesh coordinates
    pub clipping_plane: Option<ClippingPlane>,
}

impl Default for CursorFrame {
    fn default() -> Self {
        Self::new(Affine3A::IDENTITY)
    }
}

impl CursorFrame {
    pub fn new(trafo: Affine3A) -> Self {
        let linear = Mat3::from(trafo.matrix3);
        Self {
            trafo,
            uniform_scaling: is_uniform_scaling(linear),
            normal_matrix: linear.inverse().transpose(),
            clipping_plane: None,
        }
    }

    pub fn with_clipping_plane(mut self, plane: ClippingPlane) -> Self {
        self.clipping_plane = Some(plane);
        self
    }

    pub fn is_mesh_point_clipped(&self, point: Vec3) -> bool {
        self.clipping_plane
            .is_some_and(|plane| plane.is_mesh_point_clipped(point))
    }

    /// Move a mesh point into the frame cursor tests run in.
    pub fn to_frame(&self, point: Vec3) -> Vec3 {
        if self.uniform_scaling {
            point
        } else {
            self.trafo.transform_point3(point)
        }
    }

    /// Uniform scale factor of the instance.
    pub fn scale(&self) -> f32 {
        Vec3::from(self.trafo.matrix3.x_axis).length()
    }

    fn frame_normal(&self, normal: Vec3) -> Vec3 {
        if self.uniform_scaling {
            normal
        } else {
            (self.normal_matrix * normal).normalize_or_zero()
        }
    }

    /// Convert a world-space radius into the frame tests run in.
    fn frame_radius(&self, radius_world: f32) -> f32 {
        if self.uniform_scaling {
            radius_world / self.scale().max(f32::EPSILON)
        } else {
            radius_world
        }
    }
}

fn is_uniform_scaling(linear: Mat3) -> bool {
    let (x, y, z) = (linear.x_axis, linear.y_axis, linear.z_axis);
    let (lx, ly, lz) = (x.length(), y.length(), z.length());
    let tolerance = UNIFORM_SCALE_TOLERANCE * lx.max(ly).max(lz).max(f32::EPSILON);
    let orthogonal = x.dot(y).abs() <= tolerance * lx.max(ly)
        && y.dot(z).abs() <= tolerance * ly.max(lz)
        && z.dot(x).abs() <= tolerance * lz.max(lx);
    orthogonal && (lx - ly).abs() <= tolerance && (lx - lz).abs() <= tolerance
}

/// Behavior shared by every brush shape
pub trait CursorShape {
    fn frame(&self) -> &CursorFrame;

    /// Whether a point already in cursor space lies inside the brush.
    fn contains(&self, point: Vec3) -> bool;

    /// Whether a segment in cursor space crosses the brush.
    fn edge_intersects(&self, a: Vec3, b: Vec3) -> bool;

    /// Whether the pointer ray passes through the triangle (mesh space corners).
    fn is_pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool;

    /// Backface test for a mesh-space face normal.
    fn is_facet_visible(&self, normal: Vec3) -> bool;

    /// Characteristic size of the brush in cursor space.
    fn feature_size(&self) -> f32;

    fn to_cursor_space(&self, point: Vec3) -> Vec3 {
        self.frame().to_frame(point)
    }

    /// Whether a mesh point lies inside the brush and is not clipped.
    fn is_mesh_point_inside(&self, point: Vec3) -> bool {
        !self.frame().is_mesh_point_clipped(point) && self.contains(self.to_cursor_space(point))
    }

    /// Number of triangle corners inside the brush.
    fn vertices_inside(&self, corners: &[Vec3; 3]) -> usize {
        corners
            .iter()
            .filter(|&&p| self.is_mesh_point_inside(p))
            .count()
    }

    /// Whether any triangle edge passes through the brush.
    fn is_edge_inside_cursor(&self, corners: &[Vec3; 3]) -> bool {
        let pts = corners.map(|p| self.to_cursor_space(p));
        (0..3).any(|i| self.edge_intersects(pts[i], pts[(i + 1) % 3]))
    }
}

/// Cursor with a single focal point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinglePointCursor {
    pub center: Vec3,
    pub radius: f32,
    radius_sqr: f32,
    /// Unit view direction from the camera towards the center
    pub dir: Vec3,
    frame: CursorFrame,
}

impl SinglePointCursor {
    /// # Arguments
    /// * `center` - Hit point in mesh coordinates
    /// * `source` - Camera position in mesh coordinates
    /// * `radius_world` - Brush radius in world units
    /// * `frame` - Instance placement
    pub fn new(center: Vec3, source: Vec3, radius_world: f32, frame: CursorFrame) -> Self {
        let center = frame.to_frame(center);
        let source = frame.to_frame(source);
        let radius = frame.frame_radius(radius_world);
        Self {
            center,
            radius,
            radius_sqr: radius * radius,
            dir: (center - source).normalize_or_zero(),
            frame,
        }
    }

    fn pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool {
        let pts = corners.map(|p| self.frame.to_frame(p));
        line_crosses_triangle(self.center + self.dir, self.center - self.dir, &pts)
    }

    fn facet_visible(&self, normal: Vec3) -> bool {
        self.frame.frame_normal(normal).dot(self.dir) < 0.0
    }
}

/// Cursor swept between two focal points (consecutive pointer positions)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoublePointCursor {
    pub first_center: Vec3,
    pub second_center: Vec3,
    pub radius: f32,
    radius_sqr: f32,
    pub dir: Vec3,
    frame: CursorFrame,
}

impl DoublePointCursor {
    pub fn new(
        first_center: Vec3,
        second_center: Vec3,
        source: Vec3,
        radius_world: f32,
        frame: CursorFrame,
    ) -> Self {
        let first_center = frame.to_frame(first_center);
        let second_center = frame.to_frame(second_center);
        let source = frame.to_frame(source);
        let radius = frame.frame_radius(radius_world);
        Self {
            first_center,
            second_center,
            radius,
            radius_sqr: radius * radius,
            dir: (first_center - source).normalize_or_zero(),
            frame,
        }
    }

    fn pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool {
        let pts = corners.map(|p| self.frame.to_frame(p));
        [self.first_center, self.second_center]
            .into_iter()
            .any(|c| line_crosses_triangle(c + self.dir, c - self.dir, &pts))
    }

    fn facet_visible(&self, normal: Vec3) -> bool {
        self.frame.frame_normal(normal).dot(self.dir) < 0.0
    }
}

/// Ball brush
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere(pub SinglePointCursor);

/// Disc brush projected along the view direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle(pub SinglePointCursor);

/// Ball swept along the stroke segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule3D(pub DoublePointCursor);

/// Disc swept along the stroke segment, projected along the view direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule2D(pub DoublePointCursor);

/// Horizontal slab of world Z around the hit point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightRange {
    pub z_bottom: f32,
    pub z_top: f32,
    frame: CursorFrame,
}

impl CursorShape for Sphere {
    fn frame(&self) -> &CursorFrame {
        &self.0.frame
    }

    fn contains(&self, point: Vec3) -> bool {
        (point - self.0.center).length_squared() < self.0.radius_sqr
    }

    fn edge_intersects(&self, a: Vec3, b: Vec3) -> bool {
        segment_intersects_sphere(a, b, self.0.center, self.0.radius_sqr)
    }

    fn is_pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool {
        self.0.pointer_in_triangle(corners)
    }

    fn is_facet_visible(&self, normal: Vec3) -> bool {
        self.0.facet_visible(normal)
    }

    fn feature_size(&self) -> f32 {
        self.0.radius
    }
}

impl CursorShape for Circle {
    fn frame(&self) -> &CursorFrame {
        &self.0.frame
    }

    fn contains(&self, point: Vec3) -> bool {
        let diff = point - self.0.center;
        (diff - self.0.dir * diff.dot(self.0.dir)).length_squared() < self.0.radius_sqr
    }

    fn edge_intersects(&self, a: Vec3, b: Vec3) -> bool {
        let c = self.0.center;
        let a = project_onto_plane(a, c, self.0.dir);
        let b = project_onto_plane(b, c, self.0.dir);
        segment_intersects_sphere(a, b, c, self.0.radius_sqr)
    }

    fn is_pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool {
        self.0.pointer_in_triangle(corners)
    }

    fn is_facet_visible(&self, normal: Vec3) -> bool {
        self.0.facet_visible(normal)
    }

    fn feature_size(&self) -> f32 {
        self.0.radius
    }
}

impl CursorShape for Capsule3D {
    fn frame(&self) -> &CursorFrame {
        &self.0.frame
    }

    fn contains(&self, point: Vec3) -> bool {
        let closest = closest_point_on_segment(point, self.0.first_center, self.0.second_center);
        (point - closest).length_squared() < self.0.radius_sqr
    }

    fn edge_intersects(&self, a: Vec3, b: Vec3) -> bool {
        segment_intersects_capsule(
            a,
            b,
            self.0.first_center,
            self.0.second_center,
            self.0.radius_sqr,
        )
    }

    fn is_pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool {
        self.0.pointer_in_triangle(corners)
    }

    fn is_facet_visible(&self, normal: Vec3) -> bool {
        self.0.facet_visible(normal)
    }

    fn feature_size(&self) -> f32 {
        self.0.radius
    }
}

impl Capsule2D {
    /// Second focus projected into the plane of the first one.
    fn projected_second(&self) -> Vec3 {
        project_onto_plane(self.0.second_center, self.0.first_center, self.0.dir)
    }
}

impl CursorShape for Capsule2D {
    fn frame(&self) -> &CursorFrame {
        &self.0.frame
    }

    fn contains(&self, point: Vec3) -> bool {
        let first = self.0.first_center;
        let point = project_onto_plane(point, first, self.0.dir);
        let closest = closest_point_on_segment(point, first, self.projected_second());
        (point - closest).length_squared() < self.0.radius_sqr
    }

    fn edge_intersects(&self, a: Vec3, b: Vec3) -> bool {
        let first = self.0.first_center;
        let a = project_onto_plane(a, first, self.0.dir);
        let b = project_onto_plane(b, first, self.0.dir);
        segment_intersects_capsule(a, b, first, self.projected_second(), self.0.radius_sqr)
    }

    fn is_pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool {
        self.0.pointer_in_triangle(corners)
    }

    fn is_facet_visible(&self, normal: Vec3) -> bool {
        self.0.facet_visible(normal)
    }

    fn feature_size(&self) -> f32 {
        self.0.radius
    }
}

impl HeightRange {
    /// # Arguments
    /// * `hit` - Hit point in mesh coordinates
    /// * `thickness` - Slab thickness in world units
    /// * `frame` - Instance placement
    pub fn new(hit: Vec3, thickness: f32, frame: CursorFrame) -> Self {
        let z = frame.trafo.transform_point3(hit).z;
        let half = 0.5 * thickness.abs();
        Self {
            z_bottom: z - half,
            z_top: z + half,
            frame,
        }
    }
}

impl CursorShape for HeightRange {
    fn frame(&self) -> &CursorFrame {
        &self.frame
    }

    // The slab is defined in world Z, so points always go to world space.
    fn to_cursor_space(&self, point: Vec3) -> Vec3 {
        self.frame.trafo.transform_point3(point)
    }

    fn contains(&self, point: Vec3) -> bool {
        (self.z_bottom..=self.z_top).contains(&point.z)
    }

    fn edge_intersects(&self, a: Vec3, b: Vec3) -> bool {
        a.z.min(b.z) <= self.z_top && a.z.max(b.z) >= self.z_bottom
    }

    fn is_pointer_in_triangle(&self, _corners: &[Vec3; 3]) -> bool {
        false
    }

    fn is_facet_visible(&self, _normal: Vec3) -> bool {
        true
    }

    fn feature_size(&self) -> f32 {
        0.5 * (self.z_top - self.z_bottom)
    }
}

/// Closed set of brush shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cursor {
    Sphere(Sphere),
    Circle(Circle),
    Capsule3D(Capsule3D),
    Capsule2D(Capsule2D),
    HeightRange(HeightRange),
}

macro_rules! dispatch {
    ($self:ident, $shape:ident => $body:expr) => {
        match $self {
            Cursor::Sphere($shape) => $body,
            Cursor::Circle($shape) => $body,
            Cursor::Capsule3D($shape) => $body,
            Cursor::Capsule2D($shape) => $body,
            Cursor::HeightRange($shape) => $body,
        }
    };
}

impl Cursor {
    pub fn sphere(center: Vec3, source: Vec3, radius: f32, frame: CursorFrame) -> Self {
        Cursor::Sphere(Sphere(SinglePointCursor::new(center, source, radius, frame)))
    }

    pub fn circle(center: Vec3, source: Vec3, radius: f32, frame: CursorFrame) -> Self {
        Cursor::Circle(Circle(SinglePointCursor::new(center, source, radius, frame)))
    }

    pub fn capsule_3d(
        first_center: Vec3,
        second_center: Vec3,
        source: Vec3,
        radius: f32,
        frame: CursorFrame,
    ) -> Self {
        Cursor::Capsule3D(Capsule3D(DoublePointCursor::new(
            first_center,
            second_center,
            source,
            radius,
            frame,
        )))
    }

    pub fn capsule_2d(
        first_center: Vec3,
        second_center: Vec3,
        source: Vec3,
        radius: f32,
        frame: CursorFrame,
    ) -> Self {
        Cursor::Capsule2D(Capsule2D(DoublePointCursor::new(
            first_center,
            second_center,
            source,
            radius,
            frame,
        )))
    }

    pub fn height_range(hit: Vec3, thickness: f32, frame: CursorFrame) -> Self {
        Cursor::HeightRange(HeightRange::new(hit, thickness, frame))
    }
}

impl CursorShape for Cursor {
    fn frame(&self) -> &CursorFrame {
        dispatch!(self, shape => shape.frame())
    }

    fn contains(&self, point: Vec3) -> bool {
        dispatch!(self, shape => shape.contains(point))
    }

    fn edge_intersects(&self, a: Vec3, b: Vec3) -> bool {
        dispatch!(self, shape => shape.edge_intersects(a, b))
    }

    fn is_pointer_in_triangle(&self, corners: &[Vec3; 3]) -> bool {
        dispatch!(self, shape => shape.is_pointer_in_triangle(corners))
    }

    fn is_facet_visible(&self, normal: Vec3) -> bool {
        dispatch!(self, shape => shape.is_facet_visible(normal))
    }

    fn feature_size(&self) -> f32 {
        dispatch!(self, shape => shape.feature_size())
    }

    fn to_cursor_space(&self, point: Vec3) -> Vec3 {
        dispatch!(self, shape => shape.to_cursor_space(point))
    }
}
