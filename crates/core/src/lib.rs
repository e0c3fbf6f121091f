//! Domain logic for the deckbench simulation worker.
//!
//! Everything in this crate is free of database access: job and deck
//! types, the per-format resolution rules, the engine stdout parser, and
//! the subprocess runner for the external simulation engine.

pub mod deck;
pub mod engine;
pub mod error;
pub mod format;
pub mod job;
pub mod parser;
pub mod resolver;
pub mod summary;
pub mod types;
