//! Neighbor derivation for split tree nodes.
//!
//! Only original faces have stored neighbors. The neighbors of a child are
//! derived from its parent's neighbors and the parent's split pattern, so
//! they never go stale across splits and collapses.

use std::collections::HashMap;

use crate::types::IndexedTriangleSet;

use super::TriangleSelector;
use super::types::{Division, Neighbors, Node, TriangleId, Vertex, VertexId, next_idx};

/// Which half of a split edge, seen from the triangle owning the edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Partition {
    /// Half touching the edge's first vertex
    First,
    /// Half touching the edge's second vertex
    Second,
}

/// Children of a branch that touch one of its edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeChildren {
    /// The edge is not split; one child contains all of it
    Whole(usize),
    Halves { first: usize, second: usize },
}

/// Children touching edge `edge` (vertex `edge` to vertex `edge + 1`).
pub(crate) fn edge_children(division: Division, edge: usize) -> EdgeChildren {
    let s = division.special_side();
    match division.splits() {
        1 if edge == next_idx(s) => EdgeChildren::Halves { first: 0, second: 1 },
        1 => EdgeChildren::Whole(if edge == s { 0 } else { 1 }),
        2 if edge == next_idx(s) => EdgeChildren::Whole(2),
        2 if edge == s => EdgeChildren::Halves { first: 0, second: 1 },
        2 => EdgeChildren::Halves { first: 2, second: 0 },
        _ => match edge {
            0 => EdgeChildren::Halves { first: 0, second: 1 },
            1 => EdgeChildren::Halves { first: 1, second: 2 },
            _ => EdgeChildren::Halves { first: 2, second: 0 },
        },
    }
}

/// Where one edge of a child lies inside its parent
#[derive(Debug, Clone, Copy)]
enum ChildSide {
    /// Shared with a sibling
    Inner(usize),
    /// On parent edge `special_side + offset`, whole or one half of it
    Outer {
        offset: usize,
        half: Option<Partition>,
    },
}

use ChildSide::{Inner, Outer};

const fn outer_whole(offset: usize) -> ChildSide {
    Outer { offset, half: None }
}

const fn outer_half(offset: usize, partition: Partition) -> ChildSide {
    Outer {
        offset,
        half: Some(partition),
    }
}

// Halves are named from the neighbor's side of the edge, which runs the
// opposite way: `First` touches the parent's end vertex of that edge.
const ONE_SPLIT: [[ChildSide; 3]; 2] = [
    [outer_whole(0), outer_half(1, Partition::Second), Inner(1)],
    [outer_half(1, Partition::First), outer_whole(2), Inner(0)],
];

const TWO_SPLITS: [[ChildSide; 3]; 3] = [
    [outer_half(0, Partition::Second), Inner(1), outer_half(2, Partition::First)],
    [outer_half(0, Partition::First), Inner(2), Inner(0)],
    [outer_whole(1), outer_half(2, Partition::Second), Inner(1)],
];

const THREE_SPLITS: [[ChildSide; 3]; 4] = [
    [outer_half(0, Partition::Second), Inner(3), outer_half(2, Partition::First)],
    [outer_half(0, Partition::First), outer_half(1, Partition::Second), Inner(3)],
    [outer_half(1, Partition::First), outer_half(2, Partition::Second), Inner(3)],
    [Inner(1), Inner(2), Inner(0)],
];

fn child_sides(division: Division, child: usize) -> &'static [ChildSide; 3] {
    match division.splits() {
        1 => &ONE_SPLIT[child],
        2 => &TWO_SPLITS[child],
        _ => &THREE_SPLITS[child],
    }
}

/// Neighbor table produced by [`TriangleSelector::precompute_all_neighbors`]
pub(crate) struct NeighborTable {
    exact: Vec<Neighbors>,
    propagated: Vec<Neighbors>,
}

impl NeighborTable {
    /// Neighbors sharing exactly the same edge.
    pub(crate) fn exact(&self, id: TriangleId) -> Neighbors {
        self.exact[id.index()]
    }

    /// Exact neighbors, or the shallower leaf across the edge where there is none.
    pub(crate) fn propagated(&self, id: TriangleId) -> Neighbors {
        self.propagated[id.index()]
    }
}

/// Original face across every edge of every face of `mesh`.
///
/// Faces are matched by shared directed edges; the mesh is expected to be
/// manifold and consistently oriented.
pub fn mesh_face_neighbors(mesh: &IndexedTriangleSet) -> Vec<[Option<u32>; 3]> {
    // Map from directed edge (origin, destination) to the face owning it
    let mut edge_map: HashMap<(u32, u32), u32> = HashMap::with_capacity(mesh.indices.len() * 3);
    for (face, tri) in mesh.indices.iter().enumerate() {
        for e in 0..3 {
            edge_map
                .entry((tri[e], tri[next_idx(e)]))
                .or_insert(face as u32);
        }
    }

    mesh.indices
        .iter()
        .enumerate()
        .map(|(face, tri)| {
            std::array::from_fn(|e| {
                edge_map
                    .get(&(tri[next_idx(e)], tri[e]))
                    .copied()
                    .filter(|&n| n as usize != face)
            })
        })
        .collect()
}

impl TriangleSelector {
    /// Child of `neighbor` bordering one half of its edge `vi` -> `vj`.
    ///
    /// Returns `None` when `neighbor` is missing or the edge is not split
    /// inside it, i.e. there is no triangle at this depth.
    pub(crate) fn neighbor_child(
        &self,
        neighbor: Option<TriangleId>,
        vi: VertexId,
        vj: VertexId,
        partition: Partition,
    ) -> Option<TriangleId> {
        let id = neighbor?;
        let tr = &self.triangles[id];
        let Node::Branch { division, children } = tr.node else {
            return None;
        };
        let children = children.as_slice();
        match edge_children(division, tr.edge_index(vi, vj)) {
            EdgeChildren::Whole(c) => self.neighbor_child(Some(children[c]), vi, vj, partition),
            EdgeChildren::Halves { first, second } => Some(match partition {
                Partition::First => children[first],
                Partition::Second => children[second],
            }),
        }
    }

    /// Midpoint already allocated on edge `vi` -> `vj` of `neighbor`, if any.
    pub(crate) fn triangle_midpoint(
        &self,
        neighbor: Option<TriangleId>,
        vi: VertexId,
        vj: VertexId,
    ) -> Option<VertexId> {
        self.neighbor_child(neighbor, vi, vj, Partition::First)
            .map(|child| self.triangles[child].vertex_after(vi))
    }

    /// Midpoint of edge `vi` -> `vj` shared with `neighbor`, allocated if
    /// neither side has split the edge yet.
    pub(crate) fn triangle_midpoint_or_allocate(
        &mut self,
        neighbor: Option<TriangleId>,
        vi: VertexId,
        vj: VertexId,
    ) -> VertexId {
        if let Some(midpoint) = self.triangle_midpoint(neighbor, vi, vj) {
            return midpoint;
        }
        let position = 0.5 * (self.vertices[vi].position + self.vertices[vj].position);
        self.vertices.insert(Vertex::new(position))
    }

    /// Deepest node of the tree at `id` that still holds all of edge `vi` -> `vj`.
    fn edge_container(&self, id: TriangleId, vi: VertexId, vj: VertexId) -> TriangleId {
        let tr = &self.triangles[id];
        let Node::Branch { division, children } = tr.node else {
            return id;
        };
        if !tr.has_edge(vi, vj) {
            return id;
        }
        match edge_children(division, tr.edge_index(vi, vj)) {
            EdgeChildren::Whole(c) => self.edge_container(children.as_slice()[c], vi, vj),
            EdgeChildren::Halves { .. } => id,
        }
    }

    /// Exact neighbors of child `child_idx` of the branch `parent`.
    pub(crate) fn child_neighbors(
        &self,
        parent: TriangleId,
        neighbors: &Neighbors,
        child_idx: usize,
    ) -> Neighbors {
        let tr = &self.triangles[parent];
        let Node::Branch { division, children } = tr.node else {
            panic!("child_neighbors of leaf {parent:?}");
        };
        let s = division.special_side();
        let sides = *child_sides(division, child_idx);
        sides.map(|side| match side {
            Inner(sibling) => Some(children.as_slice()[sibling]),
            Outer { offset, half } => {
                let edge = (s + offset) % 3;
                match half {
                    None => neighbors[edge],
                    Some(partition) => self.neighbor_child(
                        neighbors[edge],
                        tr.verts[next_idx(edge)],
                        tr.verts[edge],
                        partition,
                    ),
                }
            }
        })
    }

    /// Propagated neighbors of child `child_idx` of `parent`.
    ///
    /// Where a child has no exact neighbor, the node across the parent edge
    /// is used, descended as long as it still holds the whole parent edge.
    /// The result is therefore either an exact neighbor or a leaf.
    pub(crate) fn child_neighbors_propagated(
        &self,
        parent: TriangleId,
        propagated: &Neighbors,
        child_idx: usize,
        child_exact: &Neighbors,
    ) -> Neighbors {
        let tr = &self.triangles[parent];
        let Some(division) = tr.division() else {
            panic!("child_neighbors_propagated of leaf {parent:?}");
        };
        let s = division.special_side();
        let sides = child_sides(division, child_idx);
        std::array::from_fn(|k| {
            if child_exact[k].is_some() {
                return child_exact[k];
            }
            match sides[k] {
                Inner(_) => child_exact[k],
                Outer { offset, .. } => {
                    let edge = (s + offset) % 3;
                    propagated[edge].map(|n| {
                        self.edge_container(n, tr.verts[next_idx(edge)], tr.verts[edge])
                    })
                }
            }
        })
    }

    /// Exact and propagated neighbors of every live node.
    pub(crate) fn precompute_all_neighbors(&self) -> NeighborTable {
        let slots = self.triangles.slot_count();
        let mut table = NeighborTable {
            exact: vec![[None; 3]; slots],
            propagated: vec![[None; 3]; slots],
        };
        for facet in 0..self.originals.len() {
            let neighbors = self.root_neighbors(facet);
            self.precompute_neighbors_recursive(
                self.originals[facet],
                neighbors,
                neighbors,
                &mut table,
            );
        }
        table
    }

    fn precompute_neighbors_recursive(
        &self,
        id: TriangleId,
        neighbors: Neighbors,
        propagated: Neighbors,
        table: &mut NeighborTable,
    ) {
        table.exact[id.index()] = neighbors;
        table.propagated[id.index()] = propagated;
        for (i, &child) in self.triangles[id].children().iter().enumerate() {
            let exact = self.child_neighbors(id, &neighbors, i);
            let child_propagated = self.child_neighbors_propagated(id, &propagated, i, &exact);
            self.precompute_neighbors_recursive(child, exact, child_propagated, table);
        }
    }

    /// Append every leaf touching edge `vi` -> `vj` of the tree at `id`,
    /// together with the part of the edge it covers.
    pub(crate) fn append_touching_subtriangles(
        &self,
        id: TriangleId,
        vi: VertexId,
        vj: VertexId,
        out: &mut Vec<(TriangleId, VertexId, VertexId)>,
    ) {
        let tr = &self.triangles[id];
        let Node::Branch { division, children } = tr.node else {
            out.push((id, vi, vj));
            return;
        };
        let children = children.as_slice();
        match edge_children(division, tr.edge_index(vi, vj)) {
            EdgeChildren::Whole(c) => self.append_touching_subtriangles(children[c], vi, vj, out),
            EdgeChildren::Halves { first, second } => {
                let midpoint = self.triangles[children[first]].vertex_after(vi);
                self.append_touching_subtriangles(children[first], vi, midpoint, out);
                self.append_touching_subtriangles(children[second], midpoint, vj, out);
            }
        }
    }

    /// Leaves touching any edge of leaf `id`, each with the shared part of
    /// the edge in the neighbor's orientation.
    pub(crate) fn touching_leaves(
        &self,
        id: TriangleId,
        table: &NeighborTable,
    ) -> Vec<(TriangleId, VertexId, VertexId)> {
        let verts = self.triangles[id].verts;
        let exact = table.exact(id);
        let propagated = table.propagated(id);
        let mut out = Vec::new();
        for e in 0..3 {
            let (vi, vj) = (verts[next_idx(e)], verts[e]);
            match (exact[e], propagated[e]) {
                (Some(neighbor), _) => self.append_touching_subtriangles(neighbor, vi, vj, &mut out),
                (None, Some(leaf)) => {
                    debug_assert!(!self.triangles[leaf].is_split());
                    out.push((leaf, vi, vj));
                }
                (None, None) => {}
            }
        }
        out
    }

    /// Whether every stored neighbor shares the reversed edge.
    pub(crate) fn verify_triangle_neighbors(&self, id: TriangleId, neighbors: &Neighbors) -> bool {
        let verts = self.triangles[id].verts;
        (0..3).all(|e| {
            neighbors[e].is_none_or(|n| {
                self.triangles
                    .get(n)
                    .is_some_and(|tr| tr.has_edge(verts[next_idx(e)], verts[e]))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use facet_paint_config::SelectorConfig;

    use super::super::test_meshes::{grid, square};
    use super::*;
    use crate::types::PaintState;

    #[test]
    fn test_mesh_face_neighbors_grid() {
        let mesh = grid(2);
        let neighbors = mesh_face_neighbors(&mesh);
        assert_eq!(neighbors.len(), 8);
        // Lower-left triangle of cell (0,0): its diagonal borders the upper one.
        assert_eq!(neighbors[0], [None, Some(1), None]);
        // Upper triangle of cell (0,0) borders cell (1,0) and cell (0,1).
        assert_eq!(neighbors[1], [Some(2), Some(4), Some(0)]);
    }

    #[test]
    fn test_edge_children_tables_cover_edges() {
        for splits in 1..=3u8 {
            for special in 0..3u8 {
                let division = Division::new(splits, special);
                for edge in 0..3 {
                    let children = edge_children(division, edge);
                    assert_eq!(
                        matches!(children, EdgeChildren::Halves { .. }),
                        division.is_edge_split(edge)
                    );
                }
            }
        }
    }

    #[test]
    fn test_midpoint_shared_between_neighbors() {
        let mut selector = TriangleSelector::new(&square(), SelectorConfig::default()).unwrap();
        let a = selector.original_id(0);
        let b = selector.original_id(1);

        // Split face 0 along the diagonal (edge 1, special side 0).
        let na = selector.root_neighbors(0);
        selector.perform_split(a, Division::new(1, 0), &na, PaintState::NONE);
        let vertices_after_first = selector.vertex_count();

        // Split face 1 along the same diagonal (edge 2, special side 1).
        let nb = selector.root_neighbors(1);
        selector.perform_split(b, Division::new(1, 1), &nb, PaintState::NONE);
        assert_eq!(selector.vertex_count(), vertices_after_first);

        let verts = selector.triangle(a).verts;
        let mid_a = selector.triangle_midpoint(Some(a), verts[1], verts[2]);
        let mid_b = selector.triangle_midpoint(Some(b), verts[2], verts[1]);
        assert!(mid_a.is_some());
        assert_eq!(mid_a, mid_b);
        assert_eq!(selector.vertex(mid_a.unwrap()).ref_count(), 4);
        assert!(selector.validate().is_ok());
    }

    #[test]
    fn test_child_neighbors_across_depth_mismatch() {
        let mut selector = TriangleSelector::new(&square(), SelectorConfig::default()).unwrap();
        let a = selector.original_id(0);
        let b = selector.original_id(1);
        let na = selector.root_neighbors(0);
        selector.perform_split(a, Division::new(3, 0), &na, PaintState::NONE);

        let table = selector.precompute_all_neighbors();
        let children = selector.triangle(a).children().to_vec();
        // Child 1 touches the diagonal; face 1 is unsplit, so there is no exact
        // neighbor but the propagated one is face 1 itself.
        assert_eq!(table.exact(children[1])[1], None);
        assert_eq!(table.propagated(children[1])[1], Some(b));
        // The middle child only borders its siblings.
        assert_eq!(
            table.exact(children[3]),
            [Some(children[1]), Some(children[2]), Some(children[0])]
        );

        // Face 1 sees both halves of the diagonal through its exact neighbor.
        let touching = selector.touching_leaves(b, &table);
        let leaves: Vec<_> = touching.iter().map(|t| t.0).collect();
        assert_eq!(leaves, vec![children[1], children[2]]);
    }
}
