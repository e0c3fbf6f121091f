//! Row structs and DTOs.
//!
//! Each submodule holds a `FromRow` entity matching a table plus the
//! conversions into `deckbench_core` domain types.

pub mod deck;
pub mod job;
