//! Emby Reconciler Library
//!
//! Turns loosely organized TV folders on an AList server into the layout Emby
//! and Jellyfin scrape cleanly: one `Series (Year)` folder per show, one
//! `S01`-style folder per season, `Series (Year) - S01E01.ext` episode files
//! with their subtitles renamed alongside. Series identities come from TMDB,
//! with an optional OpenAI-compatible assistant for hard cases.
//!
//! Every change is recorded in an undo ledger, runs can resume after an
//! interruption, and a dry run walks exactly the tree a real run would.

pub mod cli;
pub mod core;
pub mod error;
pub mod generators;
pub mod models;
pub mod preflight;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
