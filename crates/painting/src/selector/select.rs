//! Brush painting and flood fills.

use std::collections::VecDeque;

use glam::Vec3;
use tracing::{debug, trace};

use facet_paint_config::SelectorConfig;

use crate::constants::ANGLE_EPSILON;
use crate::cursor::{Cursor, CursorShape};
use crate::geometry::{incenter, is_point_inside_triangle};
use crate::types::{ClippingPlane, OverhangFilter, PaintState};

use super::TriangleSelector;
use super::types::{Neighbors, Node, TriangleId};

/// Bounds of a seed or bucket fill
#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    /// Leaves with all three corners clipped are not entered
    pub clipping_plane: Option<ClippingPlane>,
    /// Maximum angle between the normals of adjacent leaves, `None` for unlimited
    pub angle_deg: Option<f32>,
    pub overhang: Option<OverhangFilter>,
    /// Recompute the fill even if the leaf under the cursor is already selected
    pub force_reselection: bool,
}

impl FillOptions {
    /// Options with the configured seed-fill angle and no other bounds.
    pub fn from_config(config: &SelectorConfig) -> Self {
        Self {
            angle_deg: config.seed_fill_angle(),
            ..Self::default()
        }
    }

    fn is_leaf_clipped(&self, corners: &[Vec3; 3]) -> bool {
        self.clipping_plane
            .is_some_and(|plane| corners.iter().all(|&p| plane.is_mesh_point_clipped(p)))
    }
}

impl TriangleSelector {
    /// Paint everything the cursor touches, starting at original face `facet_start`.
    ///
    /// Original faces are visited breadth first; a face only spreads to its
    /// neighbors when the cursor reached it and the neighbor faces the camera.
    /// With `triangle_splitting` off, partially covered leaves are painted whole.
    ///
    /// # Panics
    /// Panics if `facet_start` is not an original face index.
    pub fn select_patch(
        &mut self,
        facet_start: usize,
        cursor: &Cursor,
        new_state: PaintState,
        triangle_splitting: bool,
        overhang: Option<&OverhangFilter>,
    ) {
        assert!(
            facet_start < self.originals.len(),
            "facet {facet_start} out of range ({} faces)",
            self.originals.len()
        );
        self.update_edge_limit(cursor.feature_size());

        let mut visited = vec![false; self.originals.len()];
        let mut queue = VecDeque::from([facet_start]);
        let mut painted = 0usize;
        while let Some(facet) = queue.pop_front() {
            if visited[facet] {
                continue;
            }
            visited[facet] = true;
            if overhang.is_some_and(|filter| !filter.accepts(self.face_normals[facet])) {
                continue;
            }
            if !self.select_triangle(facet, cursor, new_state, triangle_splitting) {
                continue;
            }
            painted += 1;
            for neighbor in self.mesh_neighbors[facet].into_iter().flatten() {
                let neighbor = neighbor as usize;
                if !visited[neighbor] && cursor.is_facet_visible(self.face_normals[neighbor]) {
                    queue.push_back(neighbor);
                }
            }
        }

        trace!(
            "select_patch: start facet {}, {} facets reached, {} live triangles",
            facet_start,
            painted,
            self.triangles.len()
        );
    }

    /// Paint one original face, then collapse what became uniform.
    ///
    /// Returns `false` if the cursor does not touch the face at all.
    fn select_triangle(
        &mut self,
        facet: usize,
        cursor: &Cursor,
        new_state: PaintState,
        triangle_splitting: bool,
    ) -> bool {
        let id = self.originals[facet];
        let neighbors = self.root_neighbors(facet);
        if !self.select_triangle_recursive(id, &neighbors, cursor, new_state, triangle_splitting) {
            return false;
        }
        self.remove_useless_children(id);
        self.maybe_garbage_collect();
        true
    }

    fn select_triangle_recursive(
        &mut self,
        id: TriangleId,
        neighbors: &Neighbors,
        cursor: &Cursor,
        new_state: PaintState,
        triangle_splitting: bool,
    ) -> bool {
        let corners = self.positions(id);
        let inside = cursor.vertices_inside(&corners);
        if inside == 0
            && !cursor.is_pointer_in_triangle(&corners)
            && !cursor.is_mesh_point_inside(incenter(corners[0], corners[1], corners[2]))
            && !cursor.is_edge_inside_cursor(&corners)
        {
            return false;
        }

        if inside == 3 {
            self.undivide(id);
            self.triangles[id].set_state(new_state);
            return true;
        }

        // Partially covered: a leaf already painted needs no refinement.
        if self.triangles[id].state() == Some(new_state) {
            return true;
        }

        if triangle_splitting {
            self.split_triangle(id, neighbors, cursor);
        } else if !self.triangles[id].is_split() {
            self.triangles[id].set_state(new_state);
        }

        if let Node::Branch { children, .. } = self.triangles[id].node {
            for (i, &child) in children.as_slice().iter().enumerate() {
                let child_neighbors = self.child_neighbors(id, neighbors, i);
                self.select_triangle_recursive(
                    child,
                    &child_neighbors,
                    cursor,
                    new_state,
                    triangle_splitting,
                );
            }
        }
        true
    }

    /// Drop any split of original face `facet` and paint it whole.
    ///
    /// # Panics
    /// Panics if `facet` is not an original face index.
    pub fn set_facet(&mut self, facet: usize, state: PaintState) {
        let id = self.original_id(facet);
        self.undivide(id);
        self.triangles[id].set_state(state);
    }

    /// Leaf of original face `facet` containing `hit`, if any.
    pub fn select_unsplit_triangle(&self, hit: Vec3, facet: usize) -> Option<TriangleId> {
        let mut id = self.original_id(facet);
        loop {
            let tr = &self.triangles[id];
            if !tr.is_split() {
                return Some(id);
            }
            id = tr.children().iter().copied().find(|&child| {
                let [a, b, c] = self.positions(child);
                is_point_inside_triangle(hit, a, b, c)
            })?;
        }
    }

    /// Flag the region reachable from the leaf under `hit` without crossing
    /// a crease sharper than the configured angle.
    ///
    /// The flags are a preview; [`Self::seed_fill_apply_on_triangles`] turns
    /// them into paint.
    pub fn seed_fill_select_triangles(
        &mut self,
        hit: Vec3,
        facet_start: usize,
        options: &FillOptions,
    ) {
        let start = match self.select_unsplit_triangle(hit, facet_start) {
            Some(id) => id,
            None => {
                debug!(
                    "seed_fill: no leaf of facet {} under {:?}, starting at its first leaf",
                    facet_start, hit
                );
                self.leaves(facet_start)[0]
            }
        };
        if !options.force_reselection
            && options.clipping_plane.is_none()
            && self.triangles[start].is_selected_by_seed_fill()
        {
            return;
        }

        self.seed_fill_unselect_all_triangles();
        self.fill_from(start, None, options);
    }

    /// Flag the region of leaves sharing the state of the leaf under `hit`.
    ///
    /// With `propagate` off only that leaf is flagged.
    pub fn bucket_fill_select_triangles(
        &mut self,
        hit: Vec3,
        facet_start: usize,
        options: &FillOptions,
        propagate: bool,
    ) {
        let Some(start) = self.select_unsplit_triangle(hit, facet_start) else {
            debug!(
                "bucket_fill: no leaf of facet {} under {:?}, nothing selected",
                facet_start, hit
            );
            return;
        };
        if !options.force_reselection && self.triangles[start].is_selected_by_seed_fill() {
            return;
        }

        self.seed_fill_unselect_all_triangles();
        if !propagate {
            if self.fill_admits(start, options) {
                self.triangles[start].set_seed_fill(true);
            }
            return;
        }
        let state = self.triangles[start].state();
        self.fill_from(start, state, options);
    }

    /// Breadth-first walk over touching leaves, flagging every leaf reached.
    fn fill_from(
        &mut self,
        start: TriangleId,
        same_state: Option<PaintState>,
        options: &FillOptions,
    ) {
        let table = self.precompute_all_neighbors();
        let cos_limit = options
            .angle_deg
            .map(|deg| deg.to_radians().cos() - ANGLE_EPSILON);

        if !self.fill_admits(start, options) {
            debug!("fill: start leaf {:?} is clipped or filtered out", start);
            return;
        }

        let mut visited = vec![false; self.triangles.slot_count()];
        visited[start.index()] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            self.triangles[id].set_seed_fill(true);
            let source = self.triangles[id].source_triangle;
            let normal = self.face_normals[source as usize];

            for (leaf, _, _) in self.touching_leaves(id, &table) {
                if visited[leaf.index()] {
                    continue;
                }
                let tr = &self.triangles[leaf];
                if same_state.is_some_and(|state| tr.state() != Some(state)) {
                    continue;
                }
                if !self.fill_admits(leaf, options) {
                    continue;
                }
                let leaf_normal = self.face_normals[tr.source_triangle as usize];
                let crease = cos_limit.is_some_and(|limit| {
                    tr.source_triangle != source && normal.dot(leaf_normal).clamp(0.0, 1.0) < limit
                });
                if crease {
                    continue;
                }
                visited[leaf.index()] = true;
                queue.push_back(leaf);
            }
        }
    }

    /// Whether a fill may enter `leaf` under the clipping plane and overhang filter.
    fn fill_admits(&self, leaf: TriangleId, options: &FillOptions) -> bool {
        let normal = self.face_normals[self.triangles[leaf].source_triangle as usize];
        !options.is_leaf_clipped(&self.positions(leaf))
            && options.overhang.is_none_or(|filter| filter.accepts(normal))
    }

    /// Paint every flagged leaf with `state` and clear the flags.
    pub fn seed_fill_apply_on_triangles(&mut self, state: PaintState) {
        for (_, tr) in self.triangles.iter_mut() {
            if tr.is_selected_by_seed_fill() {
                tr.set_state(state);
            }
        }
        for facet in 0..self.originals.len() {
            self.remove_useless_children(self.originals[facet]);
        }
        self.maybe_garbage_collect();
    }

    /// Clear the seed-fill flag on every leaf.
    pub fn seed_fill_unselect_all_triangles(&mut self) {
        for (_, tr) in self.triangles.iter_mut() {
            tr.set_seed_fill(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use facet_paint_config::SelectorConfig;

    use super::super::test_meshes::{folded, grid, single_triangle, square};
    use super::*;
    use crate::cursor::CursorFrame;
    use crate::selector::Division;

    const CENTROID: Vec3 = Vec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0);

    fn sphere(center: Vec3, radius: f32) -> Cursor {
        Cursor::sphere(center, center + Vec3::Z * 10.0, radius, CursorFrame::default())
    }

    fn flagged(selector: &TriangleSelector, facet: usize) -> bool {
        selector
            .leaves(facet)
            .iter()
            .all(|&id| selector.triangle(id).is_selected_by_seed_fill())
    }

    #[test]
    fn test_sphere_at_centroid_paints_middle_child() {
        let mut selector =
            TriangleSelector::new(&single_triangle(), SelectorConfig::with_fixed_edge_limit(0.8))
                .unwrap();
        selector.select_patch(0, &sphere(CENTROID, 0.4), PaintState::ENFORCER, true, None);

        let root = selector.original_id(0);
        let division = selector.triangle(root).division().unwrap();
        assert_eq!(division.splits(), 3);
        let children = selector.triangle(root).children().to_vec();
        assert_eq!(selector.triangle(children[3]).state(), Some(PaintState::ENFORCER));
        for &child in &children[..3] {
            assert_eq!(selector.triangle(child).state(), Some(PaintState::NONE));
        }
        assert!(selector.validate().is_ok());
    }

    #[test]
    fn test_partial_strokes_collapse_to_single_leaf() {
        let mut selector =
            TriangleSelector::new(&single_triangle(), SelectorConfig::with_fixed_edge_limit(0.8))
                .unwrap();
        selector.select_patch(0, &sphere(CENTROID, 0.4), PaintState::ENFORCER, true, None);
        for corner in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            selector.select_patch(0, &sphere(corner, 0.75), PaintState::ENFORCER, true, None);
        }

        let root = selector.original_id(0);
        assert!(!selector.triangle(root).is_split());
        assert_eq!(selector.triangle(root).state(), Some(PaintState::ENFORCER));
        assert_eq!(selector.triangle_count(), 1);
        assert_eq!(selector.vertex_count(), 3);
        assert!(selector.validate().is_ok());
    }

    #[test]
    fn test_cursor_missing_mesh_changes_nothing() {
        let mut selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        selector.select_patch(
            0,
            &sphere(Vec3::new(10.0, 10.0, 0.0), 0.5),
            PaintState::BLOCKER,
            true,
            None,
        );
        assert_eq!(selector.triangle_count(), 8);
        assert!(!selector.has_facets(PaintState::BLOCKER));
    }

    #[test]
    fn test_patch_spreads_across_faces() {
        let mut selector =
            TriangleSelector::new(&grid(2), SelectorConfig::with_fixed_edge_limit(0.3)).unwrap();
        // Centered on the grid's middle vertex, shared by faces 1 to 6.
        selector.select_patch(1, &sphere(Vec3::new(1.0, 1.0, 0.0), 0.5), PaintState::BLOCKER, true, None);

        for facet in 0..8 {
            let painted = selector
                .leaves(facet)
                .iter()
                .any(|&id| selector.triangle(id).state() == Some(PaintState::BLOCKER));
            // Faces 0 and 7 stay more than a radius away from the center.
            assert_eq!(painted, facet != 0 && facet != 7, "facet {facet}");
        }
        assert!(selector.validate().is_ok());
    }

    #[test]
    fn test_overhang_filter_skips_facets() {
        let mut selector = TriangleSelector::new(&single_triangle(), SelectorConfig::default()).unwrap();
        let filter = OverhangFilter::new(glam::Mat3::IDENTITY, 45.0);
        selector.select_patch(0, &sphere(CENTROID, 5.0), PaintState::ENFORCER, true, Some(&filter));
        assert!(!selector.has_facets(PaintState::ENFORCER));
    }

    #[test]
    fn test_without_splitting_paints_whole_facet() {
        let mut selector = TriangleSelector::new(&single_triangle(), SelectorConfig::default()).unwrap();
        selector.select_patch(0, &sphere(CENTROID, 0.2), PaintState::BLOCKER, false, None);
        let root = selector.original_id(0);
        assert!(!selector.triangle(root).is_split());
        assert_eq!(selector.triangle(root).state(), Some(PaintState::BLOCKER));
    }

    #[test]
    fn test_set_facet_discards_splits() {
        let mut selector =
            TriangleSelector::new(&single_triangle(), SelectorConfig::with_fixed_edge_limit(0.8))
                .unwrap();
        selector.select_patch(0, &sphere(CENTROID, 0.4), PaintState::ENFORCER, true, None);
        selector.set_facet(0, PaintState::extruder(3));
        assert_eq!(selector.triangle_count(), 1);
        assert_eq!(
            selector.triangle(selector.original_id(0)).state(),
            Some(PaintState::extruder(3))
        );
    }

    #[test]
    fn test_select_unsplit_triangle_descends() {
        let mut selector = TriangleSelector::new(&single_triangle(), SelectorConfig::default()).unwrap();
        let root = selector.original_id(0);
        selector.perform_split(root, Division::new(3, 0), &[None; 3], PaintState::NONE);
        let children = selector.triangle(root).children().to_vec();
        assert_eq!(selector.select_unsplit_triangle(CENTROID, 0), Some(children[3]));
        assert_eq!(
            selector.select_unsplit_triangle(Vec3::new(0.9, 0.05, 0.0), 0),
            Some(children[1])
        );
        assert_eq!(selector.select_unsplit_triangle(Vec3::new(2.0, 2.0, 0.0), 0), None);
    }

    #[test]
    fn test_seed_fill_stops_at_sharp_crease() {
        let mut selector = TriangleSelector::new(&folded(60.0), SelectorConfig::default()).unwrap();
        let options = FillOptions::from_config(selector.config());
        selector.seed_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &options);
        assert!(flagged(&selector, 0));
        assert!(!flagged(&selector, 1));

        let mut selector = TriangleSelector::new(&folded(10.0), SelectorConfig::default()).unwrap();
        selector.seed_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &options);
        assert!(flagged(&selector, 0));
        assert!(flagged(&selector, 1));
    }

    #[test]
    fn test_seed_fill_respects_clipping_plane() {
        let mut selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        let options = FillOptions {
            clipping_plane: Some(ClippingPlane::new(Vec3::X, 0.9)),
            ..FillOptions::default()
        };
        selector.seed_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &options);
        for facet in [0, 1, 4, 5] {
            assert!(flagged(&selector, facet), "facet {facet} not flagged");
        }
        for facet in [2, 3, 6, 7] {
            assert!(!flagged(&selector, facet), "facet {facet} flagged");
        }
    }

    #[test]
    fn test_seed_fill_apply_and_unselect() {
        let mut selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        selector.seed_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &FillOptions::default());
        assert!((0..8).all(|facet| flagged(&selector, facet)));

        selector.seed_fill_unselect_all_triangles();
        assert!(!(0..8).any(|facet| flagged(&selector, facet)));

        selector.seed_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &FillOptions::default());
        selector.seed_fill_apply_on_triangles(PaintState::ENFORCER);
        assert_eq!(selector.num_facets(PaintState::ENFORCER), 8);
        assert!(!(0..8).any(|facet| flagged(&selector, facet)));
    }

    #[test]
    fn test_bucket_fill_same_state_region() {
        let mut selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        selector.set_facet(0, PaintState::BLOCKER);
        selector.set_facet(1, PaintState::BLOCKER);
        selector.set_facet(7, PaintState::BLOCKER);

        selector.bucket_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &FillOptions::default(), true);
        assert!(flagged(&selector, 0));
        assert!(flagged(&selector, 1));
        for facet in 2..8 {
            assert!(!flagged(&selector, facet), "facet {facet} flagged");
        }

        selector.seed_fill_apply_on_triangles(PaintState::ENFORCER);
        assert_eq!(selector.num_facets(PaintState::ENFORCER), 2);
        assert_eq!(selector.num_facets(PaintState::BLOCKER), 1);
    }

    #[test]
    fn test_bucket_fill_without_propagation() {
        let mut selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        selector.bucket_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &FillOptions::default(), false);
        assert!(flagged(&selector, 0));
        assert!(!(1..8).any(|facet| flagged(&selector, facet)));
    }

    #[test]
    fn test_bucket_fill_across_depth_mismatch() {
        let mut selector = TriangleSelector::new(&square(), SelectorConfig::default()).unwrap();
        let a = selector.original_id(0);
        let na = selector.root_neighbors(0);
        selector.perform_split(a, Division::new(3, 0), &na, PaintState::BLOCKER);
        let children = selector.triangle(a).children().to_vec();
        selector.triangles[children[0]].set_state(PaintState::NONE);
        selector.set_facet(1, PaintState::BLOCKER);

        selector.bucket_fill_select_triangles(Vec3::new(0.8, 0.8, 0.0), 1, &FillOptions::default(), true);
        assert!(flagged(&selector, 1));
        for &child in &children[1..] {
            assert!(selector.triangle(child).is_selected_by_seed_fill());
        }
        assert!(!selector.triangle(children[0]).is_selected_by_seed_fill());
    }

    #[test]
    fn test_fill_does_not_start_on_clipped_leaf() {
        let mut selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        let options = FillOptions {
            clipping_plane: Some(ClippingPlane::new(Vec3::X, 0.9)),
            ..FillOptions::default()
        };
        // Face 2 lies entirely beyond the plane.
        selector.seed_fill_select_triangles(Vec3::new(1.2, 0.2, 0.0), 2, &options);
        assert!(!(0..8).any(|facet| flagged(&selector, facet)));

        selector.bucket_fill_select_triangles(Vec3::new(1.2, 0.2, 0.0), 2, &options, true);
        assert!(!(0..8).any(|facet| flagged(&selector, facet)));

        selector.bucket_fill_select_triangles(Vec3::new(1.2, 0.2, 0.0), 2, &options, false);
        assert!(!flagged(&selector, 2));
    }

    #[test]
    fn test_fill_does_not_start_on_overhang_filtered_leaf() {
        let mut selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        // Grid faces point up, the filter only accepts faces pointing down.
        let options = FillOptions {
            overhang: Some(OverhangFilter::new(glam::Mat3::IDENTITY, 45.0)),
            ..FillOptions::default()
        };
        selector.seed_fill_select_triangles(Vec3::new(0.2, 0.2, 0.0), 0, &options);
        assert!(!(0..8).any(|facet| flagged(&selector, facet)));
    }
}
