//! Persisted form of the split trees.
//!
//! Every original face that is split or painted is recorded as its index and
//! the offset of its tree in one shared bitstream. Nodes are written depth
//! first, least significant bit first:
//!
//! - 2 bits: number of split sides
//! - branch: 2 bits special side, then the children in reverse order
//! - leaf: 2 bits state for states 0-2, otherwise `11` and 4 bits of `state - 3`

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{EXTENDED_STATE_BITS, MAX_SHORT_STATE, SPLIT_BITS, STATE_COUNT, STATE_ESCAPE};
use crate::error::SelectorError;
use crate::types::PaintState;

use super::TriangleSelector;
use super::types::{Division, Neighbors, Node, TriangleId};

/// Bits holding a special side or a short state
const FIELD_BITS: usize = 2;

/// Start of one original face's tree in the bitstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleBitStreamMapping {
    pub triangle_idx: u32,
    pub bitstream_start_idx: u32,
}

/// Serialized paint of a whole selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleSplittingData {
    /// Recorded original faces, in mesh order
    pub triangles_to_split: Vec<TriangleBitStreamMapping>,
    pub bitstream: Vec<bool>,
    /// Which states occur on a recorded leaf, indexed by state code
    pub used_states: [bool; STATE_COUNT],
}

/// One decoded tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Code {
    Split(Division),
    /// Raw state code, not yet clamped
    Leaf(u8),
}

struct BitReader<'a> {
    bits: &'a [bool],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bits: &'a [bool], pos: usize) -> Self {
        Self { bits, pos }
    }

    fn read(&mut self, count: usize) -> Result<u8, SelectorError> {
        let end = self.pos + count;
        if end > self.bits.len() {
            return Err(SelectorError::TruncatedBitstream {
                offset: self.pos,
                len: self.bits.len(),
            });
        }
        let value = self.bits[self.pos..end]
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << i));
        self.pos = end;
        Ok(value)
    }

    fn read_node(&mut self) -> Result<Code, SelectorError> {
        let splits = self.read(SPLIT_BITS)?;
        if splits == 0 {
            let code = self.read(FIELD_BITS)?;
            if code == STATE_ESCAPE {
                return Ok(Code::Leaf(self.read(EXTENDED_STATE_BITS)? + MAX_SHORT_STATE + 1));
            }
            return Ok(Code::Leaf(code));
        }

        let side = self.read(FIELD_BITS)?;
        if side > 2 && splits < 3 {
            return Err(SelectorError::InvalidSplitCode { splits, side });
        }
        Ok(Code::Split(Division::new(splits, side.min(2))))
    }
}

fn push_bits(bitstream: &mut Vec<bool>, value: u8, count: usize) {
    bitstream.extend((0..count).map(|i| value & (1 << i) != 0));
}

/// Frame of a branch whose children are being read
struct ProcessingInfo {
    facet_id: TriangleId,
    neighbors: Neighbors,
    processed_children: usize,
    total_children: usize,
}

impl TriangleSplittingData {
    fn mapping_reader(&self, mapping: &TriangleBitStreamMapping) -> BitReader<'_> {
        BitReader::new(&self.bitstream, mapping.bitstream_start_idx as usize)
    }

    /// Raw state codes of every recorded leaf. A malformed tree contributes
    /// the leaves decoded before the defect.
    fn leaf_codes(&self) -> Vec<u8> {
        let mut codes = Vec::new();
        for mapping in &self.triangles_to_split {
            let mut reader = self.mapping_reader(mapping);
            let mut pending = 1usize;
            while pending > 0 {
                pending -= 1;
                match reader.read_node() {
                    Ok(Code::Split(division)) => pending += division.children_count(),
                    Ok(Code::Leaf(code)) => codes.push(code),
                    Err(_) => break,
                }
            }
        }
        codes
    }

    /// Whether a recorded leaf carries `state`, without building a tree.
    pub fn has_facets(&self, state: PaintState) -> bool {
        self.leaf_codes().contains(&state.code())
    }

    /// Number of recorded leaves carrying `state`.
    pub fn count_facets(&self, state: PaintState) -> usize {
        self.leaf_codes()
            .into_iter()
            .filter(|&code| code == state.code())
            .count()
    }

    /// Recompute [`Self::used_states`] from the bitstream.
    pub fn update_used_states(&mut self) {
        self.used_states = [false; STATE_COUNT];
        for code in self.leaf_codes() {
            if let Some(used) = self.used_states.get_mut(code as usize) {
                *used = true;
            }
        }
    }

    /// Check every recorded tree against a mesh with `facet_count` faces.
    fn validate(&self, facet_count: usize) -> Result<(), SelectorError> {
        for mapping in &self.triangles_to_split {
            if mapping.triangle_idx as usize >= facet_count {
                return Err(SelectorError::TriangleOutOfRange {
                    index: mapping.triangle_idx,
                    count: facet_count,
                });
            }
            let mut reader = self.mapping_reader(mapping);
            let mut pending = 1usize;
            while pending > 0 {
                pending -= 1;
                if let Code::Split(division) = reader.read_node()? {
                    pending += division.children_count();
                }
            }
        }
        Ok(())
    }
}

impl TriangleSelector {
    /// Encode every split or painted original face.
    pub fn serialize(&self) -> TriangleSplittingData {
        let mut data = TriangleSplittingData::default();
        for (facet, &id) in self.originals.iter().enumerate() {
            let tr = &self.triangles[id];
            if !tr.is_split() && tr.state() == Some(PaintState::NONE) {
                continue;
            }
            data.triangles_to_split.push(TriangleBitStreamMapping {
                triangle_idx: facet as u32,
                bitstream_start_idx: data.bitstream.len() as u32,
            });
            self.serialize_recursive(id, &mut data);
        }
        data
    }

    fn serialize_recursive(&self, id: TriangleId, data: &mut TriangleSplittingData) {
        match self.triangles[id].node {
            Node::Branch { division, children } => {
                push_bits(&mut data.bitstream, division.splits(), SPLIT_BITS);
                push_bits(&mut data.bitstream, division.special_side() as u8, FIELD_BITS);
                for &child in children.as_slice().iter().rev() {
                    self.serialize_recursive(child, data);
                }
            }
            Node::Leaf { state, .. } => {
                push_bits(&mut data.bitstream, 0, SPLIT_BITS);
                data.used_states[state.index()] = true;
                if state.is_extended() {
                    push_bits(&mut data.bitstream, STATE_ESCAPE, FIELD_BITS);
                    push_bits(
                        &mut data.bitstream,
                        state.code() - MAX_SHORT_STATE - 1,
                        EXTENDED_STATE_BITS,
                    );
                } else {
                    push_bits(&mut data.bitstream, state.code(), FIELD_BITS);
                }
            }
        }
    }

    /// Rebuild the recorded trees from `data`.
    ///
    /// With `needs_reset` every face is cleared first; otherwise only the
    /// recorded faces are replaced. States above `max_state` load as
    /// [`PaintState::NONE`]. The whole blob is checked before anything is
    /// touched, so an error leaves the selector as it was.
    pub fn deserialize(
        &mut self,
        data: &TriangleSplittingData,
        needs_reset: bool,
        max_state: PaintState,
    ) -> Result<(), SelectorError> {
        if let Err(err) = data.validate(self.originals.len()) {
            warn!("Rejecting serialized paint data: {}", err);
            return Err(err);
        }

        if needs_reset {
            self.reset();
        }

        let mut clamped = 0usize;
        for mapping in &data.triangles_to_split {
            let facet = mapping.triangle_idx as usize;
            let root = self.originals[facet];
            if !needs_reset {
                self.undivide(root);
            }

            let mut reader = data.mapping_reader(mapping);
            let mut stack: Vec<ProcessingInfo> = Vec::new();
            let mut current = root;
            let mut neighbors = self.root_neighbors(facet);
            loop {
                match reader.read_node()? {
                    Code::Split(division) => {
                        self.perform_split(current, division, &neighbors, PaintState::NONE);
                        stack.push(ProcessingInfo {
                            facet_id: current,
                            neighbors,
                            processed_children: 0,
                            total_children: division.children_count(),
                        });
                    }
                    Code::Leaf(code) => {
                        let state = match PaintState::from_code(code) {
                            Some(state) if state <= max_state => state,
                            _ => {
                                clamped += 1;
                                PaintState::NONE
                            }
                        };
                        self.triangles[current].set_state(state);
                    }
                }

                // Pop finished frames and step into the next unread child.
                let next = loop {
                    let Some(top) = stack.last_mut() else {
                        break None;
                    };
                    if top.processed_children == top.total_children {
                        stack.pop();
                        continue;
                    }
                    let child_idx = top.total_children - top.processed_children - 1;
                    top.processed_children += 1;
                    break Some((top.facet_id, top.neighbors, child_idx));
                };
                let Some((parent, parent_neighbors, child_idx)) = next else {
                    break;
                };
                current = self.triangles[parent].children()[child_idx];
                neighbors = self.child_neighbors(parent, &parent_neighbors, child_idx);
            }
        }

        debug!(
            "deserialize: {} triangles, {} bits, {} states clamped",
            data.triangles_to_split.len(),
            data.bitstream.len(),
            clamped
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use facet_paint_config::SelectorConfig;
    use glam::Vec3;

    use super::super::test_meshes::{grid, single_triangle};
    use super::*;
    use crate::cursor::{Cursor, CursorFrame};

    fn painted_grid() -> TriangleSelector {
        let mut selector =
            TriangleSelector::new(&grid(3), SelectorConfig::with_fixed_edge_limit(0.3)).unwrap();
        let stroke = |center: Vec3, radius: f32| {
            Cursor::sphere(center, center + Vec3::Z * 10.0, radius, CursorFrame::default())
        };
        selector.select_patch(8, &stroke(Vec3::new(1.2, 1.3, 0.0), 0.6), PaintState::ENFORCER, true, None);
        selector.select_patch(10, &stroke(Vec3::new(2.1, 1.8, 0.0), 0.5), PaintState::extruder(7), true, None);
        selector.set_facet(0, PaintState::BLOCKER);
        selector.set_facet(17, PaintState::extruder(16));
        selector
    }

    #[test]
    fn test_extended_state_bits() {
        let mut selector = TriangleSelector::new(&single_triangle(), SelectorConfig::default()).unwrap();
        selector.set_facet(0, PaintState::extruder(7));
        let data = selector.serialize();
        assert_eq!(
            data.triangles_to_split,
            vec![TriangleBitStreamMapping {
                triangle_idx: 0,
                bitstream_start_idx: 0
            }]
        );
        assert_eq!(
            data.bitstream,
            vec![false, false, true, true, false, true, true, false]
        );
        assert!(data.used_states[9]);
    }

    #[test]
    fn test_unpainted_faces_are_not_recorded() {
        let selector = TriangleSelector::new(&grid(2), SelectorConfig::default()).unwrap();
        let data = selector.serialize();
        assert!(data.triangles_to_split.is_empty());
        assert!(data.bitstream.is_empty());
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let selector = painted_grid();
        let data = selector.serialize();
        assert!(data.used_states[PaintState::extruder(7).index()]);
        assert!(data.used_states[PaintState::extruder(16).index()]);

        let json = serde_json::to_string(&data).unwrap();
        let loaded: TriangleSplittingData = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, data);

        let mut restored = TriangleSelector::new(&grid(3), SelectorConfig::default()).unwrap();
        restored.deserialize(&loaded, true, PaintState::MAX).unwrap();
        assert_eq!(restored.serialize(), data);
        assert_eq!(restored.triangle_count(), selector.triangle_count());
        assert_eq!(restored.vertex_count(), selector.vertex_count());
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn test_states_above_max_are_cleared() {
        let mut selector = TriangleSelector::new(&grid(1), SelectorConfig::default()).unwrap();
        selector.set_facet(0, PaintState::extruder(5));
        selector.set_facet(1, PaintState::extruder(2));
        let data = selector.serialize();

        let mut config = SelectorConfig::default();
        config.extruder_count = 2;
        let mut restored = TriangleSelector::new(&grid(1), config).unwrap();
        let max_state = restored.max_supported_state();
        restored.deserialize(&data, true, max_state).unwrap();
        assert_eq!(restored.num_facets(PaintState::extruder(2)), 1);
        assert_eq!(restored.num_facets(PaintState::extruder(5)), 0);
        assert_eq!(restored.num_facets(PaintState::NONE), 1);
    }

    #[test]
    fn test_partial_load_keeps_unlisted_faces() {
        let mut source = TriangleSelector::new(&grid(1), SelectorConfig::default()).unwrap();
        source.set_facet(1, PaintState::ENFORCER);
        let data = source.serialize();

        let mut target = TriangleSelector::new(&grid(1), SelectorConfig::default()).unwrap();
        target.set_facet(0, PaintState::BLOCKER);
        target.set_facet(1, PaintState::BLOCKER);
        target.deserialize(&data, false, PaintState::MAX).unwrap();
        assert_eq!(target.num_facets(PaintState::BLOCKER), 1);
        assert_eq!(target.num_facets(PaintState::ENFORCER), 1);
    }

    #[test]
    fn test_malformed_data_is_rejected_intact() {
        let mut selector = TriangleSelector::new(&single_triangle(), SelectorConfig::default()).unwrap();
        selector.set_facet(0, PaintState::BLOCKER);
        let before = selector.serialize();

        let out_of_range = TriangleSplittingData {
            triangles_to_split: vec![TriangleBitStreamMapping {
                triangle_idx: 3,
                bitstream_start_idx: 0,
            }],
            bitstream: vec![false; 4],
            used_states: [false; STATE_COUNT],
        };
        assert_eq!(
            selector.deserialize(&out_of_range, true, PaintState::MAX),
            Err(SelectorError::TriangleOutOfRange { index: 3, count: 1 })
        );

        // A 3-way split whose children are missing.
        let truncated = TriangleSplittingData {
            triangles_to_split: vec![TriangleBitStreamMapping::default()],
            bitstream: vec![true, true, false, false],
            used_states: [false; STATE_COUNT],
        };
        assert_eq!(
            selector.deserialize(&truncated, true, PaintState::MAX),
            Err(SelectorError::TruncatedBitstream { offset: 4, len: 4 })
        );

        // A 1-way split with special side 3.
        let invalid = TriangleSplittingData {
            triangles_to_split: vec![TriangleBitStreamMapping::default()],
            bitstream: vec![true, false, true, true],
            used_states: [false; STATE_COUNT],
        };
        assert_eq!(
            selector.deserialize(&invalid, true, PaintState::MAX),
            Err(SelectorError::InvalidSplitCode { splits: 1, side: 3 })
        );

        assert_eq!(selector.serialize(), before);
    }

    #[test]
    fn test_queries_on_serialized_data() {
        let selector = painted_grid();
        let mut data = selector.serialize();
        assert!(data.has_facets(PaintState::BLOCKER));
        assert!(data.has_facets(PaintState::extruder(16)));
        assert!(!data.has_facets(PaintState::extruder(3)));
        assert_eq!(
            data.count_facets(PaintState::ENFORCER),
            selector.num_facets(PaintState::ENFORCER)
        );

        let used = data.used_states;
        data.used_states = [false; STATE_COUNT];
        data.update_used_states();
        assert_eq!(data.used_states, used);
    }
}
