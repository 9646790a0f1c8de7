//! HTML views rendered with askama.

pub mod relative_time;
pub mod views;
