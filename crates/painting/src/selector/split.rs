//! Node allocation, splitting, collapsing and compaction.

use tracing::debug;

use crate::cursor::{Cursor, CursorShape};
use crate::types::PaintState;

use super::TriangleSelector;
use super::types::{Children, Division, Neighbors, Node, Triangle, TriangleId, VertexId, next_idx, prev_idx};

impl TriangleSelector {
    /// Allocate a leaf and take a reference on its vertices.
    pub(crate) fn push_triangle(
        &mut self,
        verts: [VertexId; 3],
        source_triangle: u32,
        state: PaintState,
    ) -> TriangleId {
        for v in verts {
            self.vertices[v].ref_count += 1;
        }
        self.triangles
            .insert(Triangle::leaf(verts, source_triangle, state))
    }

    /// Drop one reference on a vertex, reclaiming split midpoints at zero.
    fn release_vertex(&mut self, v: VertexId) {
        let vertex = &mut self.vertices[v];
        debug_assert!(vertex.ref_count > 0, "releasing unreferenced vertex {v:?}");
        vertex.ref_count -= 1;
        if vertex.ref_count == 0 && v.index() >= self.vertices.pinned_len() {
            self.vertices.remove(v);
        }
    }

    /// Split a leaf along every side longer than the edge limit.
    ///
    /// Side lengths are measured in the cursor's frame, so non-uniformly
    /// scaled instances split by their world-space size. A leaf with no side
    /// above the limit is left alone.
    pub(crate) fn split_triangle(
        &mut self,
        id: TriangleId,
        neighbors: &Neighbors,
        cursor: &Cursor,
    ) {
        let tr = &self.triangles[id];
        let Some(state) = tr.state() else {
            return;
        };

        let pts = self.positions(id).map(|p| cursor.to_cursor_space(p));
        // sides[i] is the squared length of the side opposite vertex i
        let sides = [
            (pts[2] - pts[1]).length_squared(),
            (pts[0] - pts[2]).length_squared(),
            (pts[1] - pts[0]).length_squared(),
        ];

        let mut split_count = 0u8;
        let mut first_split = 0u8;
        let mut side_to_keep = 0u8;
        for (i, &side) in sides.iter().enumerate() {
            if side > self.edge_limit_sqr {
                if split_count == 0 {
                    first_split = i as u8;
                }
                split_count += 1;
            } else {
                side_to_keep = i as u8;
            }
        }
        if split_count == 0 {
            return;
        }

        let special_side = if split_count == 2 {
            side_to_keep
        } else {
            first_split
        };
        self.perform_split(id, Division::new(split_count, special_side), neighbors, state);
    }

    /// Create the children of `id` for the given division.
    ///
    /// Midpoints already created by a neighbor on the same edge are reused.
    /// Children start as leaves with `state`.
    pub(crate) fn perform_split(
        &mut self,
        id: TriangleId,
        division: Division,
        neighbors: &Neighbors,
        state: PaintState,
    ) {
        let tr = &self.triangles[id];
        debug_assert!(!tr.is_split(), "splitting branch {id:?}");
        debug_assert!(self.verify_triangle_neighbors(id, neighbors));

        let s = division.special_side();
        let source = tr.source_triangle;
        let [a, b, c] = [tr.verts[s], tr.verts[next_idx(s)], tr.verts[prev_idx(s)]];

        let children = match division.splits() {
            1 => {
                let m = self.triangle_midpoint_or_allocate(neighbors[next_idx(s)], c, b);
                Children::from_slice(&[
                    self.push_triangle([a, b, m], source, state),
                    self.push_triangle([m, c, a], source, state),
                ])
            }
            2 => {
                let m_ab = self.triangle_midpoint_or_allocate(neighbors[s], b, a);
                let m_ca = self.triangle_midpoint_or_allocate(neighbors[prev_idx(s)], a, c);
                Children::from_slice(&[
                    self.push_triangle([a, m_ab, m_ca], source, state),
                    self.push_triangle([m_ab, b, m_ca], source, state),
                    self.push_triangle([b, c, m_ca], source, state),
                ])
            }
            _ => {
                let m_ab = self.triangle_midpoint_or_allocate(neighbors[0], b, a);
                let m_bc = self.triangle_midpoint_or_allocate(neighbors[1], c, b);
                let m_ca = self.triangle_midpoint_or_allocate(neighbors[2], a, c);
                Children::from_slice(&[
                    self.push_triangle([a, m_ab, m_ca], source, state),
                    self.push_triangle([m_ab, b, m_bc], source, state),
                    self.push_triangle([m_bc, c, m_ca], source, state),
                    self.push_triangle([m_ab, m_bc, m_ca], source, state),
                ])
            }
        };
        self.triangles[id].node = Node::Branch { division, children };
    }

    /// Release every descendant of `id` and turn it into an unpainted leaf.
    ///
    /// Does nothing on a leaf.
    pub(crate) fn undivide(&mut self, id: TriangleId) {
        let Node::Branch { children, .. } = self.triangles[id].node else {
            return;
        };
        for &child in children.as_slice() {
            self.undivide(child);
            let removed = self.triangles.remove(child);
            for v in removed.verts {
                self.release_vertex(v);
            }
        }
        self.triangles[id].set_state(PaintState::NONE);
    }

    /// Collapse branches whose children all ended up as leaves of one state.
    pub(crate) fn remove_useless_children(&mut self, id: TriangleId) {
        let Node::Branch { children, .. } = self.triangles[id].node else {
            return;
        };
        for &child in children.as_slice() {
            self.remove_useless_children(child);
        }

        let mut common = None;
        for &child in children.as_slice() {
            let Some(state) = self.triangles[child].state() else {
                return;
            };
            match common {
                None => common = Some(state),
                Some(first) if first != state => return,
                Some(_) => {}
            }
        }
        if let Some(state) = common {
            self.undivide(id);
            self.triangles[id].set_state(state);
        }
    }

    /// Compact both arenas, rewriting every child and vertex handle.
    pub fn garbage_collect(&mut self) {
        let triangles_before = self.triangles.slot_count();
        let vertices_before = self.vertices.slot_count();

        let triangle_map = self.triangles.compact();
        let vertex_map = self.vertices.compact();
        for (_, tr) in self.triangles.iter_mut() {
            tr.verts = tr.verts.map(|v| vertex_map.apply(v));
            if let Node::Branch { children, .. } = &mut tr.node {
                *children = children.map(|c| triangle_map.apply(c));
            }
        }
        for id in &mut self.originals {
            *id = triangle_map.apply(*id);
        }

        debug!(
            "garbage_collect: triangles {} -> {}, vertices {} -> {}",
            triangles_before,
            self.triangles.slot_count(),
            vertices_before,
            self.vertices.slot_count()
        );
    }

    /// Run garbage collection once enough slots are vacant.
    pub(crate) fn maybe_garbage_collect(&mut self) {
        let vacant = self.triangles.vacant_count() as f32;
        if vacant > self.config.gc_invalid_ratio * self.triangles.slot_count() as f32 {
            self.garbage_collect();
        }
    }
}
