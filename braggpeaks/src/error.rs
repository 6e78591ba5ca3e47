use thiserror::Error;

/// Errors reported before any scan of a count volume begins.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FindPeaksError {
    #[error("count volume has no rows")]
    ZeroRows,

    #[error("count volume has no columns")]
    ZeroColumns,

    #[error("count volume has no time channels")]
    ZeroChannels,

    #[error("count volume data has {actual} values, expected {expected}")]
    DataLength { expected: usize, actual: usize },

    #[error("row {row} has a different number of columns than row 0")]
    RaggedRows { row: usize },

    #[error("bin ({row}, {col}) has a different number of channels than bin (0, 0)")]
    RaggedColumns { row: usize, col: usize },

    #[error("histogram buffer must have at least one bin")]
    EmptyHistogram,
}
