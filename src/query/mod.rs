//! Listing query engine: filter, sort and paginate fetched hero records.
//!
//! Everything here is a pure, synchronous function of its arguments. Fetching
//! happens before, in a [`crate::fetcher::ListingSource`]; staleness and
//! cancellation belong to the consumer ([`crate::feed::ListingFeed`]).

pub mod filter;
pub mod paginate;
pub mod sort;

pub use filter::{apply_filters, FilterSpec, SpecError};
pub use paginate::{paginate, Identified, Page};
pub use sort::{sort_records, ParseSortError, SortDirection, SortKey, SortSpec};

use serde::{Deserialize, Serialize};

use crate::types::Hero;

/// Distinguishes "nothing was fetched" from "nothing matched".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    NoRecords,
    NoMatches,
    Matched,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub status: QueryStatus,
    pub fetched: usize,
    pub records: Vec<Hero>,
}

/// Filter then sort.
pub fn run_query(
    records: Vec<Hero>,
    filter: &FilterSpec,
    sort: SortSpec,
    prioritize_listed: bool,
) -> QueryResult {
    let fetched = records.len();
    if fetched == 0 {
        return QueryResult { status: QueryStatus::NoRecords, fetched, records };
    }
    let filtered = apply_filters(records, filter);
    let status = if filtered.is_empty() { QueryStatus::NoMatches } else { QueryStatus::Matched };
    QueryResult { status, fetched, records: sort_records(filtered, sort, prioritize_listed) }
}
