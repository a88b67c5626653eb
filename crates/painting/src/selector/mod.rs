//! Adaptive per-triangle paint selector
//!
//! Every face of the input mesh is the root of a split tree. Triangles cut by
//! a brush boundary are split into 2-4 children; triangles fully inside or
//! outside keep (or collapse back to) their original resolution.
//!
//! - [`adjacency`] derives same-depth neighbors of any node on demand
//! - [`split`] allocates, splits, collapses and compacts nodes
//! - [`select`] implements brush painting, seed fill and bucket fill
//! - [`export`] flattens leaves into triangle sets and contours
//! - [`serialize`] converts trees to and from the persisted bitstream

mod adjacency;
mod export;
mod select;
mod serialize;
mod split;
mod types;
mod validation;

use glam::Vec3;
use tracing::debug;

use facet_paint_config::{EdgeLimit, SelectorConfig};

use crate::arena::Arena;
use crate::error::SelectorError;
use crate::types::{IndexedTriangleSet, PaintState};

pub use adjacency::mesh_face_neighbors;
pub use select::FillOptions;
pub use serialize::{TriangleBitStreamMapping, TriangleSplittingData};
pub use types::{Children, Division, Neighbors, Node, Triangle, TriangleId, Vertex, VertexId};

/// Paint selector over one immutable indexed mesh
#[derive(Debug, Clone)]
pub struct TriangleSelector {
    pub(crate) triangles: Arena<Triangle>,
    pub(crate) vertices: Arena<Vertex>,
    /// Root node of every original face, in mesh order
    pub(crate) originals: Vec<TriangleId>,
    /// Original face across each edge of every original face
    pub(crate) mesh_neighbors: Vec<[Option<u32>; 3]>,
    pub(crate) face_normals: Vec<Vec3>,
    pub(crate) config: SelectorConfig,
    pub(crate) edge_limit_sqr: f32,
    /// Cursor feature size the current edge limit was derived from
    pub(crate) last_feature_size: Option<f32>,
}

impl TriangleSelector {
    /// Build a selector over `mesh`, computing face normals from its geometry.
    pub fn new(mesh: &IndexedTriangleSet, config: SelectorConfig) -> Result<Self, SelectorError> {
        check_vertex_indices(mesh)?;
        Self::with_face_normals(mesh, mesh.face_normals(), config)
    }

    /// Build a selector over `mesh` with caller-supplied face normals.
    ///
    /// # Panics
    /// Panics if `face_normals` does not hold one normal per face.
    pub fn with_face_normals(
        mesh: &IndexedTriangleSet,
        face_normals: Vec<Vec3>,
        config: SelectorConfig,
    ) -> Result<Self, SelectorError> {
        assert_eq!(
            face_normals.len(),
            mesh.triangle_count(),
            "one normal per face expected"
        );
        check_vertex_indices(mesh)?;

        let mut vertices = Arena::with_capacity(mesh.vertices.len());
        let vertex_ids: Vec<VertexId> = mesh
            .vertices
            .iter()
            .map(|&p| vertices.insert(Vertex::new(p)))
            .collect();
        vertices.pin_all();

        let mut triangles = Arena::with_capacity(mesh.triangle_count());
        let originals: Vec<TriangleId> = mesh
            .indices
            .iter()
            .enumerate()
            .map(|(face, indices)| {
                let verts = indices.map(|i| vertex_ids[i as usize]);
                for v in verts {
                    vertices[v].ref_count += 1;
                }
                triangles.insert(Triangle::leaf(verts, face as u32, PaintState::NONE))
            })
            .collect();
        triangles.pin_all();

        let mesh_neighbors = mesh_face_neighbors(mesh);
        debug!(
            "TriangleSelector: {} faces, {} vertices",
            originals.len(),
            vertex_ids.len()
        );

        let edge_limit = config.initial_edge_limit;
        Ok(Self {
            triangles,
            vertices,
            originals,
            mesh_neighbors,
            face_normals,
            config,
            edge_limit_sqr: edge_limit * edge_limit,
            last_feature_size: None,
        })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Number of faces of the input mesh.
    pub fn original_count(&self) -> usize {
        self.originals.len()
    }

    /// Root node of original face `facet`.
    ///
    /// # Panics
    /// Panics if `facet` is not an original face index.
    pub fn original_id(&self, facet: usize) -> TriangleId {
        assert!(
            facet < self.originals.len(),
            "facet {facet} out of range ({} faces)",
            self.originals.len()
        );
        self.originals[facet]
    }

    pub fn triangle(&self, id: TriangleId) -> &Triangle {
        &self.triangles[id]
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id]
    }

    /// Number of live nodes, branches included.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_normal(&self, facet: usize) -> Vec3 {
        self.face_normals[facet]
    }

    /// Current maximum edge length of split triangles.
    pub fn edge_limit(&self) -> f32 {
        self.edge_limit_sqr.sqrt()
    }

    /// Set the maximum edge length; existing splits are kept.
    ///
    /// Switches the edge limit policy to [`EdgeLimit::Fixed`], so later strokes
    /// no longer derive the limit from the cursor size.
    pub fn set_edge_limit(&mut self, length: f32) {
        self.config.edge_limit = EdgeLimit::Fixed { length };
        self.edge_limit_sqr = length * length;
        self.last_feature_size = None;
    }

    /// Highest state this selector accepts when loading serialized data.
    pub fn max_supported_state(&self) -> PaintState {
        match self.config.extruder_lanes() {
            0 => PaintState::BLOCKER,
            lanes => PaintState::extruder(lanes),
        }
    }

    /// Drop every split and paint, returning to the original partition.
    pub fn reset(&mut self) {
        for facet in 0..self.originals.len() {
            let id = self.originals[facet];
            self.undivide(id);
            self.triangles[id].set_state(PaintState::NONE);
        }
        self.garbage_collect();
    }

    /// Leaves of the tree rooted at original face `facet`, depth-first.
    pub fn leaves(&self, facet: usize) -> Vec<TriangleId> {
        let mut out = Vec::new();
        let mut stack = vec![self.original_id(facet)];
        while let Some(id) = stack.pop() {
            let tr = &self.triangles[id];
            if tr.is_split() {
                stack.extend(tr.children().iter().rev());
            } else {
                out.push(id);
            }
        }
        out
    }

    /// Corner positions of a node.
    pub fn positions(&self, id: TriangleId) -> [Vec3; 3] {
        self.triangles[id].verts.map(|v| self.vertices[v].position)
    }

    /// Exact neighbors of original face `facet`.
    pub(crate) fn root_neighbors(&self, facet: usize) -> Neighbors {
        self.mesh_neighbors[facet].map(|n| n.map(|n| self.originals[n as usize]))
    }

    /// Adapt the edge limit to the cursor when its size changed.
    pub(crate) fn update_edge_limit(&mut self, feature_size: f32) {
        if self.last_feature_size != Some(feature_size) {
            let length = self.config.edge_limit.resolve(feature_size);
            self.edge_limit_sqr = length * length;
            self.last_feature_size = Some(feature_size);
        }
    }
}

/// Reject faces referencing vertices the mesh does not have.
fn check_vertex_indices(mesh: &IndexedTriangleSet) -> Result<(), SelectorError> {
    let vertex_count = mesh.vertices.len();
    for (face, indices) in mesh.indices.iter().enumerate() {
        if let Some(&vertex) = indices.iter().find(|&&v| v as usize >= vertex_count) {
            return Err(SelectorError::VertexOutOfRange {
                face,
                vertex,
                vertex_count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_meshes {
    use glam::Vec3;

    use crate::types::IndexedTriangleSet;

    /// Single right triangle in the XY plane.
    pub fn single_triangle() -> IndexedTriangleSet {
        IndexedTriangleSet::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]])
    }

    /// Unit square made of two triangles sharing the diagonal 1-2.
    pub fn square() -> IndexedTriangleSet {
        IndexedTriangleSet::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 3, 2]],
        )
    }

    /// Regular `n` x `n` grid of unit-sized cells in the XY plane, two triangles per cell.
    pub fn grid(n: u32) -> IndexedTriangleSet {
        let mut vertices = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                vertices.push(Vec3::new(x as f32, y as f32, 0.0));
            }
        }
        let at = |x: u32, y: u32| y * (n + 1) + x;
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                indices.push([at(x, y), at(x + 1, y), at(x, y + 1)]);
                indices.push([at(x + 1, y), at(x + 1, y + 1), at(x, y + 1)]);
            }
        }
        IndexedTriangleSet::new(vertices, indices)
    }

    /// Two faces folded along the shared edge 1-2 by `angle_deg` out of plane.
    pub fn folded(angle_deg: f32) -> IndexedTriangleSet {
        let angle = angle_deg.to_radians();
        // Second face rotated about the diagonal from (1,0,0) to (0,1,0).
        let mid = Vec3::new(0.5, 0.5, 0.0);
        let out = Vec3::new(0.5, 0.5, 0.0).normalize() * std::f32::consts::FRAC_1_SQRT_2;
        let tip = mid + out * angle.cos() + Vec3::Z * (out.length() * angle.sin());
        IndexedTriangleSet::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, tip],
            vec![[0, 1, 2], [1, 3, 2]],
        )
    }
}
