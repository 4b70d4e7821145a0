//! Search parameters for contractor listing.

use crate::mapping::{DateFilter, Pagination};
use crate::model::contractor::ContractorStatus;

/// Optional filters; `None` fields do not constrain the search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractorSearchParameters {
    pub pagination: Pagination,
    /// Exact business identification number.
    pub bin: Option<String>,
    /// Case-insensitive name prefix.
    pub name: Option<String>,
    /// Case-insensitive email prefix.
    pub email: Option<String>,
    pub status: Option<ContractorStatus>,
    pub ids: Option<Vec<i64>>,
    pub exclude_ids: Option<Vec<i64>>,
    pub block_date: Option<DateFilter>,
}
