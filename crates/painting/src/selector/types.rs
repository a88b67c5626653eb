//! Node and vertex types stored in the selector arenas.

use glam::Vec3;

use crate::arena::Id;
use crate::types::PaintState;

/// Handle of a triangle node
pub type TriangleId = Id<Triangle>;

/// Handle of a vertex
pub type VertexId = Id<Vertex>;

/// Neighbor across each edge; edge `e` runs from vertex `e` to vertex `e + 1`.
pub type Neighbors = [Option<TriangleId>; 3];

pub(crate) fn next_idx(i: usize) -> usize {
    if i == 2 { 0 } else { i + 1 }
}

pub(crate) fn prev_idx(i: usize) -> usize {
    if i == 0 { 2 } else { i - 1 }
}

/// A vertex of the original mesh or a split midpoint
#[derive(Debug, Clone)]
pub struct Vertex {
    pub position: Vec3,
    /// Number of live triangles using this vertex
    pub(crate) ref_count: u32,
}

impl Vertex {
    pub(crate) fn new(position: Vec3) -> Self {
        Self {
            position,
            ref_count: 0,
        }
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }
}

/// How a branch node is split
///
/// With one split side, `special_side` is the vertex opposite the split edge.
/// With two, it is the vertex shared by both split edges. With three it is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Division {
    splits: u8,
    special_side: u8,
}

impl Division {
    /// # Panics
    /// Panics if `splits` is not in `1..=3` or `special_side` is not in `0..=2`.
    pub fn new(splits: u8, special_side: u8) -> Self {
        assert!((1..=3).contains(&splits), "invalid split count {splits}");
        assert!(special_side < 3, "invalid special side {special_side}");
        Self {
            splits,
            special_side: if splits == 3 { 0 } else { special_side },
        }
    }

    pub fn splits(self) -> u8 {
        self.splits
    }

    pub fn special_side(self) -> usize {
        self.special_side as usize
    }

    pub fn children_count(self) -> usize {
        self.splits as usize + 1
    }

    /// Whether edge `edge` (vertex `edge` to vertex `edge + 1`) carries a midpoint.
    pub fn is_edge_split(self, edge: usize) -> bool {
        let opposite = next_idx(self.special_side());
        match self.splits {
            1 => edge == opposite,
            2 => edge != opposite,
            _ => true,
        }
    }
}

/// Children of a branch node, in split order
#[derive(Debug, Clone, Copy)]
pub struct Children {
    ids: [TriangleId; 4],
    len: u8,
}

impl Children {
    pub(crate) fn from_slice(children: &[TriangleId]) -> Self {
        assert!((2..=4).contains(&children.len()));
        let mut ids = [children[0]; 4];
        ids[..children.len()].copy_from_slice(children);
        Self {
            ids,
            len: children.len() as u8,
        }
    }

    pub fn as_slice(&self) -> &[TriangleId] {
        &self.ids[..self.len as usize]
    }

    pub(crate) fn map(self, f: impl FnMut(TriangleId) -> TriangleId) -> Self {
        Self {
            ids: self.ids.map(f),
            len: self.len,
        }
    }
}

/// A tree node is either a painted leaf or a split branch, never both
#[derive(Debug, Clone, Copy)]
pub enum Node {
    Leaf {
        state: PaintState,
        /// Scratch flag set by seed and bucket fill
        selected_by_seed_fill: bool,
    },
    Branch {
        division: Division,
        children: Children,
    },
}

/// A triangle of the split tree
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Corner vertices in CCW order
    pub verts: [VertexId; 3],
    /// Index of the original mesh face this triangle was cut from
    pub source_triangle: u32,
    pub(crate) node: Node,
}

impl Triangle {
    pub(crate) fn leaf(verts: [VertexId; 3], source_triangle: u32, state: PaintState) -> Self {
        Self {
            verts,
            source_triangle,
            node: Node::Leaf {
                state,
                selected_by_seed_fill: false,
            },
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn is_split(&self) -> bool {
        matches!(self.node, Node::Branch { .. })
    }

    /// Paint state, `None` for branch nodes.
    pub fn state(&self) -> Option<PaintState> {
        match self.node {
            Node::Leaf { state, .. } => Some(state),
            Node::Branch { .. } => None,
        }
    }

    pub fn division(&self) -> Option<Division> {
        match self.node {
            Node::Branch { division, .. } => Some(division),
            Node::Leaf { .. } => None,
        }
    }

    /// Number of split sides (0 for leaves).
    pub fn number_of_splits(&self) -> u8 {
        self.division().map_or(0, Division::splits)
    }

    pub fn children(&self) -> &[TriangleId] {
        match &self.node {
            Node::Branch { children, .. } => children.as_slice(),
            Node::Leaf { .. } => &[],
        }
    }

    pub fn is_selected_by_seed_fill(&self) -> bool {
        matches!(
            self.node,
            Node::Leaf {
                selected_by_seed_fill: true,
                ..
            }
        )
    }

    /// Turn this node into a leaf with the given state.
    ///
    /// Callers must have released the children first.
    pub(crate) fn set_state(&mut self, state: PaintState) {
        self.node = Node::Leaf {
            state,
            selected_by_seed_fill: false,
        };
    }

    pub(crate) fn set_seed_fill(&mut self, selected: bool) {
        if let Node::Leaf {
            selected_by_seed_fill,
            ..
        } = &mut self.node
        {
            *selected_by_seed_fill = selected;
        }
    }

    /// Index of the edge running from `vi` to `vj`.
    pub(crate) fn edge_index(&self, vi: VertexId, vj: VertexId) -> usize {
        let edge = self
            .verts
            .iter()
            .position(|&v| v == vi)
            .unwrap_or_else(|| panic!("vertex {vi:?} not on triangle"));
        debug_assert_eq!(self.verts[next_idx(edge)], vj, "edge orientation mismatch");
        edge
    }

    /// Vertex that follows `v` in CCW order.
    pub(crate) fn vertex_after(&self, v: VertexId) -> VertexId {
        let i = self
            .verts
            .iter()
            .position(|&x| x == v)
            .unwrap_or_else(|| panic!("vertex {v:?} not on triangle"));
        self.verts[next_idx(i)]
    }

    /// Whether the triangle has the directed edge `vi` -> `vj`.
    pub(crate) fn has_edge(&self, vi: VertexId, vj: VertexId) -> bool {
        (0..3).any(|e| self.verts[e] == vi && self.verts[next_idx(e)] == vj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_split_edges() {
        // One split side: only the edge opposite the special vertex is split.
        let single = Division::new(1, 0);
        assert!(single.is_edge_split(1));
        assert!(!single.is_edge_split(0));
        assert!(!single.is_edge_split(2));

        // Two split sides: both edges touching the special vertex are split.
        let double = Division::new(2, 1);
        assert!(double.is_edge_split(0));
        assert!(double.is_edge_split(1));
        assert!(!double.is_edge_split(2));

        let full = Division::new(3, 2);
        assert_eq!(full.special_side(), 0);
        assert_eq!(full.children_count(), 4);
    }

    #[test]
    fn test_index_helpers() {
        assert_eq!(next_idx(2), 0);
        assert_eq!(prev_idx(0), 2);
        assert_eq!(next_idx(prev_idx(1)), 1);
    }
}
