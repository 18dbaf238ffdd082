pub mod controller;
pub mod endpoint;
pub mod feed;
pub mod query;

// Re-export commonly used types
pub use controller::{
    Fetch, FetchMode, FetchOutcome, ListingController, ListingState, LoadFailure,
};
pub use endpoint::JobsEndpoint;
pub use feed::ScrollFeed;
pub use query::{Filter, PageRequest, QueryState, DEFAULT_PAGE_SIZE};
