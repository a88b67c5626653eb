use thiserror::Error;

/// Errors that can be triggered from outside the selector
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Face {face} references vertex {vertex}, mesh has {vertex_count} vertices")]
    VertexOutOfRange {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },
    #[error("Serialized triangle {index} out of range, mesh has {count} triangles")]
    TriangleOutOfRange { index: u32, count: usize },
    #[error("Bitstream truncated at bit {offset} (length {len})")]
    TruncatedBitstream { offset: usize, len: usize },
    #[error("Paint state {code} out of range, highest state is {max}")]
    StateOutOfRange { code: u8, max: u8 },
    #[error("Invalid special side {side} for a {splits}-way split")]
    InvalidSplitCode { splits: u8, side: u8 },
}
