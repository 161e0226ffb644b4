//! Core reconciliation logic.

pub mod assist;
pub mod classify;
pub mod cleanup;
pub mod discovery;
pub mod engine;
pub mod ledger;
pub mod ops;
pub mod overlay;
pub mod parser;
pub mod query;
pub mod resolver;
pub mod rollback;
pub mod runner;
pub mod variety;
