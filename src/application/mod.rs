//! Application services: procedures, query caching, page and composer state.

pub mod api;
pub mod auth;
pub mod composer;
pub mod error;
pub mod feed;
pub mod page;
pub mod procedures;
pub mod query_cache;
pub mod rate_limit;
pub mod repos;
pub mod ssg;
pub mod stream;
