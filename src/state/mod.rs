pub mod listing_store;

pub use listing_store::{ListingStore, ReplaceSummary};
