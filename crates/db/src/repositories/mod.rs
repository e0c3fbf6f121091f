//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod deck_repo;
pub mod job_repo;

pub use deck_repo::DeckRepo;
pub use job_repo::JobRepo;
