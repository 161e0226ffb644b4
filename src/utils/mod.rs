//! Shared helpers.

pub mod chinese;
pub mod fs;
