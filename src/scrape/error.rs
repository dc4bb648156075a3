// src/scrape/error.rs

use thiserror::Error;

/// A table cell whose markup is missing a node its shape requires.
///
/// `cell` is the zero-based position of the `<td>` among all cells visited
/// in document order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("cell {cell} has no content")]
    EmptyCell { cell: usize },

    #[error("cell {cell} has an empty <font> wrapper")]
    EmptyFont { cell: usize },

    #[error("cell {cell} has a line break with nothing after it")]
    DanglingBreak { cell: usize },

    #[error("cell {cell} wraps an empty anchor")]
    EmptyAnchor { cell: usize },
}
