//! Canonical file and folder names.

pub mod filename;
pub mod folder;
