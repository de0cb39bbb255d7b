use thiserror::Error;

/// Rejected transformation layouts.
///
/// Width mismatches between records, lanes and scatter arguments are caught
/// at compile time; these are the checks that need the buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{records} records is not a multiple of the {block}-record block")]
    Unaligned { records: usize, block: usize },
    #[error("input holds {available} records, {requested} requested")]
    InputTooShort { requested: usize, available: usize },
    #[error("output holds {available} records, {requested} requested")]
    OutputTooShort { requested: usize, available: usize },
    #[error("field {field} out of range for a {elements}-field record")]
    FieldOutOfRange { field: usize, elements: usize },
    #[error("{buffer} buffer is not aligned to its {align}-byte elements")]
    Misaligned { buffer: &'static str, align: usize },
}

pub type Result<T> = core::result::Result<T, LayoutError>;
