//! Generic data-mapping layer between hand-written SQL and the driver.
//!
//! # Responsibility
//! - Rewrite `:name` tokens into driver positional markers.
//! - Build dynamic filter fragments against one owned argument bag.
//! - Materialize row cursors into typed entities via [`DecodeRow`].
//!
//! # Invariants
//! - Every token in a filter fragment has a key in its argument bag.
//! - Cursors are released exactly once on every retrieval path.
//! - "No rows" is never reported as an error by read operations.
//!
//! # See also
//! - `repo::contractor_repo` for the main consumer.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod filters;
pub mod pagination;
pub mod placeholders;
pub mod scanner;
pub mod sqlite;
pub mod values;

pub use filters::{DateFilter, FilterBuilder, LIKE_CONTAINS, LIKE_PREFIX};
pub use pagination::{Pagination, DEFAULT_PAGE_SIZE};
pub use placeholders::{inline_named_placeholders, postgres_marker, sqlite_marker};
pub use scanner::{DecodeRow, RowCursor, RowSource, ScanTarget, Scanner};
pub use sqlite::{execute_with_map, query_with_map, SqliteCursor};

/// Key-to-value mapping supplying token values for one query build.
///
/// Owned by exactly one builder; never shared between query constructions.
pub type NamedArgs = BTreeMap<String, rusqlite::types::Value>;

pub type MapResult<T> = Result<T, MapError>;

/// Failure taxonomy of the mapping layer.
#[derive(Debug)]
pub enum MapError {
    /// A token in SQL text has no matching argument.
    MissingParameter(String),
    /// Decode-level sentinel: the source had nothing to decode.
    NoRows,
    /// Row data is malformed or does not match the target type.
    Decode(String),
    /// An argument could not be encoded for the driver.
    Encode(String),
    /// Driver-level failure (dispatch, prepare, cursor advance).
    Db(rusqlite::Error),
}

impl Display for MapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParameter(name) => {
                write!(f, "no value supplied for query parameter `:{name}`")
            }
            Self::NoRows => write!(f, "no rows in result set"),
            Self::Decode(message) => write!(f, "failed to decode row: {message}"),
            Self::Encode(message) => write!(f, "failed to encode argument: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::MissingParameter(_) | Self::NoRows | Self::Decode(_) | Self::Encode(_) => None,
        }
    }
}

impl From<rusqlite::Error> for MapError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Self::NoRows,
            other => Self::Db(other),
        }
    }
}
