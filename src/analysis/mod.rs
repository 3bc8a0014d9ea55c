//! Queries over a built snapshot: filters, class aggregates, diffs, search,
//! the allocation timeline and the allocation profile.

pub mod aggregates;
pub mod allocation;
pub mod diff;
pub mod filter;
pub mod samples;
pub mod search;

pub use aggregates::ClassAggregates;
pub use allocation::AllocationProfile;
pub use filter::{FilterKey, NodeFilter, ResolvedFilter};
pub use search::SearchConfig;
