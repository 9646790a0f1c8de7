//! Domain layer types and invariants.

pub mod emoji;
pub mod entities;
pub mod error;
pub mod posts;
