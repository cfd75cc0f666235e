//! Catalogue use-case services.
//!
//! # Responsibility
//! - Turn loosely-populated requests into validated repository commands.
//! - Keep callers decoupled from storage details.

pub mod category_service;
