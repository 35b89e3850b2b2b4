//! mtgdb core library
//!
//! Mirrors MTGJSON card data into a local SQLite store and validates
//! generated deck lists against it.
//!
//! # Architecture
//!
//! - [`fetch`] - bounded-parallel archive downloads with retry and progress
//! - [`unpack`] - zip / bare JSON extraction into per-archive directories
//! - [`dataset`] - tolerant parsing of MTGJSON set and card records
//! - [`store`] - transactional upserts, statistics and the link registry
//! - [`deck`] - candidate parsing, name resolution and deck validation
//! - [`pipeline`] - fetch → unpack → parse → store orchestration
//! - [`db`] - connection pool and schema migrations

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dataset;
pub mod db;
pub mod deck;
pub mod fetch;
pub mod pipeline;
pub mod store;
pub mod unpack;

// Re-export commonly used types
pub use db::{Database, DatabaseOptions, DbError};
pub use deck::{DeckRules, DeckValidation, DeckValidator, parse_candidate_list};
pub use fetch::{FetchEngine, FetchRequest, HttpClient, RetryPolicy};
pub use pipeline::{IngestPipeline, IngestReport};
pub use store::{CardStore, LinkRegistry};
