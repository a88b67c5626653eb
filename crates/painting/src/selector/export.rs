//! Flattening the split trees into triangle sets, contours and statistics.

use std::collections::HashMap;

use glam::Vec3;

use crate::constants::STATE_COUNT;
use crate::types::{IndexedTriangleSet, PaintState};

use super::TriangleSelector;
use super::adjacency::Partition;
use super::types::{Neighbors, TriangleId, VertexId, next_idx, prev_idx};

impl TriangleSelector {
    /// Leaves painted with `state`, as they are.
    ///
    /// Where two sides of an edge are split to different depths the result
    /// has T-junctions; use [`Self::get_facets_strict`] for a watertight patch.
    pub fn get_facets(&self, state: PaintState) -> IndexedTriangleSet {
        let triangles: Vec<[VertexId; 3]> = (0..self.originals.len())
            .flat_map(|facet| self.leaves(facet))
            .filter(|&id| self.triangles[id].state() == Some(state))
            .map(|id| self.triangles[id].verts)
            .collect();
        self.to_triangle_set(&triangles)
    }

    /// Leaves painted with `state`, re-triangulated at every midpoint the
    /// other side of an edge introduced.
    pub fn get_facets_strict(&self, state: PaintState) -> IndexedTriangleSet {
        let mut triangles = Vec::new();
        for facet in 0..self.originals.len() {
            let neighbors = self.root_neighbors(facet);
            self.collect_strict(self.originals[facet], &neighbors, state, &mut triangles);
        }
        self.to_triangle_set(&triangles)
    }

    fn collect_strict(
        &self,
        id: TriangleId,
        neighbors: &Neighbors,
        state: PaintState,
        out: &mut Vec<[VertexId; 3]>,
    ) {
        let tr = &self.triangles[id];
        if tr.is_split() {
            for (i, &child) in tr.children().iter().enumerate() {
                let child_neighbors = self.child_neighbors(id, neighbors, i);
                self.collect_strict(child, &child_neighbors, state, out);
            }
        } else if tr.state() == Some(state) {
            self.split_by_tjoints(tr.verts, neighbors, out);
        }
    }

    /// Cut a leaf at the first edge midpoint owned by its neighbor and recurse
    /// into both halves until no edge carries a foreign midpoint.
    fn split_by_tjoints(
        &self,
        verts: [VertexId; 3],
        neighbors: &Neighbors,
        out: &mut Vec<[VertexId; 3]>,
    ) {
        let split = (0..3).find_map(|e| {
            self.triangle_midpoint(neighbors[e], verts[next_idx(e)], verts[e])
                .map(|midpoint| (e, midpoint))
        });
        let Some((e, m)) = split else {
            out.push(verts);
            return;
        };

        let (a, b, c) = (verts[e], verts[next_idx(e)], verts[prev_idx(e)]);
        let first_neighbors = [
            self.neighbor_child(neighbors[e], b, a, Partition::Second),
            None,
            neighbors[prev_idx(e)],
        ];
        let second_neighbors = [
            self.neighbor_child(neighbors[e], b, a, Partition::First),
            neighbors[next_idx(e)],
            None,
        ];
        self.split_by_tjoints([a, m, c], &first_neighbors, out);
        self.split_by_tjoints([m, b, c], &second_neighbors, out);
    }

    fn to_triangle_set(&self, triangles: &[[VertexId; 3]]) -> IndexedTriangleSet {
        let mut index_of: HashMap<VertexId, u32> = HashMap::new();
        let mut vertices = Vec::new();
        let indices = triangles
            .iter()
            .map(|verts| {
                verts.map(|v| {
                    *index_of.entry(v).or_insert_with(|| {
                        vertices.push(self.vertices[v].position);
                        (vertices.len() - 1) as u32
                    })
                })
            })
            .collect();
        IndexedTriangleSet::new(vertices, indices)
    }

    /// Edges separating seed-fill flagged leaves from the rest of the mesh,
    /// mesh boundary included.
    pub fn get_seed_fill_contour(&self) -> Vec<[Vec3; 2]> {
        let table = self.precompute_all_neighbors();
        let selected = |id: TriangleId| self.triangles[id].is_selected_by_seed_fill();
        let position = |v: VertexId| self.vertices[v].position;

        let mut contour = Vec::new();
        let mut touching = Vec::new();
        for (id, tr) in self.triangles.iter() {
            if !tr.is_selected_by_seed_fill() {
                continue;
            }
            let exact = table.exact(id);
            let propagated = table.propagated(id);
            for e in 0..3 {
                let (vi, vj) = (tr.verts[e], tr.verts[next_idx(e)]);
                match (exact[e], propagated[e]) {
                    (Some(neighbor), _) => {
                        touching.clear();
                        self.append_touching_subtriangles(neighbor, vj, vi, &mut touching);
                        for &(leaf, a, b) in &touching {
                            if !selected(leaf) {
                                contour.push([position(b), position(a)]);
                            }
                        }
                    }
                    (None, Some(leaf)) => {
                        if !selected(leaf) {
                            contour.push([position(vi), position(vj)]);
                        }
                    }
                    (None, None) => contour.push([position(vi), position(vj)]),
                }
            }
        }
        contour
    }

    /// Whether any leaf is painted with `state`.
    pub fn has_facets(&self, state: PaintState) -> bool {
        self.triangles
            .iter()
            .any(|(_, tr)| tr.state() == Some(state))
    }

    /// Number of leaves painted with `state`.
    pub fn num_facets(&self, state: PaintState) -> usize {
        self.triangles
            .iter()
            .filter(|(_, tr)| tr.state() == Some(state))
            .count()
    }

    /// Which states occur on at least one leaf, indexed by state code.
    pub fn used_states(&self) -> [bool; STATE_COUNT] {
        let mut used = [false; STATE_COUNT];
        for (_, tr) in self.triangles.iter() {
            if let Some(state) = tr.state() {
                used[state.index()] = true;
            }
        }
        used
    }
}
