//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for categories and
//!   their parcels.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate commands before persistence.
//! - Lookups that find nothing return `RepoError::NotFound`, never a panic
//!   or a silent default.

pub mod category_repo;
pub mod parcel_repo;
mod schema;
