//! Error types for the `rqg` library.

use std::io;
use thiserror::Error as ThisError;

/// Errors produced by the `rqg` library.
#[derive(ThisError, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A rule reference could not be resolved in strict mode.
    #[error("unresolved rule '{0}'")]
    UnresolvedRule(String),

    /// A template placeholder could not be resolved in strict mode.
    #[error("unresolved placeholder '{0}'")]
    UnresolvedPlaceholder(String),

    /// A choice element was constructed with no options.
    #[error("choice requires at least one option")]
    EmptyChoice,

    /// A weighted choice was constructed with mismatching weight count.
    #[error("choice has {options} options but {weights} weights")]
    WeightCountMismatch {
        /// Number of options supplied.
        options: usize,
        /// Number of weights supplied.
        weights: usize,
    },

    /// All weights of a weighted choice were zero.
    #[error("total weight must be positive")]
    ZeroTotalWeight,

    /// An optional element was given a probability outside `0..=1`.
    #[error("probability {0} is not between 0 and 1")]
    InvalidProbability(f64),

    /// A repeat or number element was given an inverted range.
    #[error("invalid range: {lo} is greater than {hi}")]
    InvalidRange {
        /// Lower bound.
        lo: i64,
        /// Upper bound.
        hi: i64,
    },

    /// A grammar name was not found in the registry.
    #[error("grammar '{name}' not found; available: {available}")]
    UnknownGrammar {
        /// The requested grammar name.
        name: String,
        /// Comma-separated list of registered grammar names.
        available: String,
    },

    /// A constraint or index mentions a column the table does not have.
    #[error("table '{table}' has no column '{column}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Missing column name.
        column: String,
    },

    /// An unsupported SQL dialect name.
    #[error("unsupported SQL dialect '{0}'")]
    UnsupportedDialect(String),

    /// Generic IO error while writing executor progress output.
    #[error("failed to write progress output")]
    Io(#[from] io::Error),
}
