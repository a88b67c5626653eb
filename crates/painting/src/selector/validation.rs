//! Structural checks for the split trees.
//!
//! Verifies:
//! - every vertex's reference count matches the live triangles using it
//! - every live triangle hangs under exactly one original face
//! - derived neighbors agree on the shared edge and point back

use std::collections::HashMap;

use super::TriangleSelector;
use super::types::{TriangleId, VertexId, next_idx};

impl TriangleSelector {
    /// Check the arena and tree invariants, describing the first violation.
    pub fn validate(&self) -> Result<(), String> {
        // Walk every tree, checking sources and collecting reachable nodes
        let mut reachable: Vec<TriangleId> = Vec::with_capacity(self.triangles.len());
        let mut parent: HashMap<TriangleId, TriangleId> = HashMap::new();
        for (facet, &root) in self.originals.iter().enumerate() {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                let tr = self
                    .triangles
                    .get(id)
                    .ok_or_else(|| format!("Facet {facet}: dangling node {id:?}"))?;
                if tr.source_triangle as usize != facet {
                    return Err(format!(
                        "Node {:?}: source triangle {}, expected {}",
                        id, tr.source_triangle, facet
                    ));
                }
                let children_expected = tr.division().map_or(0, |d| d.children_count());
                if tr.children().len() != children_expected {
                    return Err(format!(
                        "Node {:?}: {} children for {} split sides",
                        id,
                        tr.children().len(),
                        tr.number_of_splits()
                    ));
                }
                reachable.push(id);
                for &child in tr.children() {
                    parent.insert(child, id);
                    stack.push(child);
                }
            }
        }
        if reachable.len() != self.triangles.len() {
            return Err(format!(
                "{} live triangles, {} reachable from original faces",
                self.triangles.len(),
                reachable.len()
            ));
        }

        // Reference counts
        let mut references: HashMap<VertexId, u32> = HashMap::new();
        for &id in &reachable {
            for v in self.triangles[id].verts {
                if !self.vertices.contains(v) {
                    return Err(format!("Node {id:?}: dangling vertex {v:?}"));
                }
                *references.entry(v).or_default() += 1;
            }
        }
        for (v, vertex) in self.vertices.iter() {
            let expected = references.get(&v).copied().unwrap_or(0);
            if vertex.ref_count != expected {
                return Err(format!(
                    "Vertex {:?}: ref count {}, used by {} triangles",
                    v, vertex.ref_count, expected
                ));
            }
            if expected == 0 && v.index() >= self.vertices.pinned_len() {
                return Err(format!("Vertex {v:?}: unreferenced midpoint still live"));
            }
        }

        // Neighbor agreement
        let table = self.precompute_all_neighbors();
        for &id in &reachable {
            let verts = self.triangles[id].verts;
            let neighbors = table.exact(id);
            for e in 0..3 {
                let Some(n) = neighbors[e] else {
                    continue;
                };
                let (vi, vj) = (verts[next_idx(e)], verts[e]);
                let other = &self.triangles[n];
                if !other.has_edge(vi, vj) {
                    return Err(format!(
                        "Node {id:?}: neighbor {n:?} across edge {e} lacks the reversed edge"
                    ));
                }
                // Across a depth mismatch the back-pointer names the
                // shallowest node of this lineage still holding the edge.
                let back = table.exact(n)[other.edge_index(vi, vj)];
                let lineage_holds = back.is_some_and(|back| {
                    self.triangles[back].has_edge(vj, vi)
                        && (is_ancestor(&parent, back, id) || is_ancestor(&parent, id, back))
                });
                if back != Some(id) && !lineage_holds {
                    return Err(format!(
                        "Node {id:?}: neighbor {n:?} across edge {e} points back to {back:?}"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Whether `ancestor` lies on the parent chain of `id`.
fn is_ancestor(
    parent: &HashMap<TriangleId, TriangleId>,
    ancestor: TriangleId,
    id: TriangleId,
) -> bool {
    let mut current = id;
    while let Some(&up) = parent.get(&current) {
        if up == ancestor {
            return true;
        }
        current = up;
    }
    false
}
