//! Client for the Freelify freelance marketplace API.
//!
//! The centre of the crate is [`listing::ListingController`], which pages
//! through `/jobs` for a search/filter/sort query and keeps the accumulated
//! list plus loading flags for whatever renders it. [`api`] holds the HTTP
//! client, the job endpoints and the backend JWT sync.

pub mod api;
pub mod config;
pub mod listing;
pub mod shutdown;
