//! Domain model for the parcel catalogue.
//!
//! # Responsibility
//! - Define the category record and its soft-delete lifecycle.
//! - Define the dependent parcel and trip-status records that listings
//!   filter and aggregate over.
//!
//! # Invariants
//! - Every category is identified by a stable `CategoryId`.
//! - Trashed state is an explicit `Lifecycle`, never an implicit null check.

pub mod category;
pub mod parcel;
