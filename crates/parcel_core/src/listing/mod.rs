//! Filtered listing engine.
//!
//! # Responsibility
//! - Describe listing requests as typed values (`CategoryFilter`,
//!   `PageRequest`) instead of loose attribute maps.
//! - Turn optional filter inputs into SQL predicates folded over a
//!   `SelectBuilder`, independent of which repository runs them.
//! - Shape results into `Page<T>` with link parameters for stateful paging.
//!
//! # Invariants
//! - Filters are independent and order-irrelevant.
//! - A missing or unresolvable filter input is a no-op, never an error.
//! - Listing order is always `created_at DESC, id DESC`.

pub mod filter;
pub mod page;
pub(crate) mod query;

pub use filter::{CategoryFilter, CategoryRelation, RelatedFilter, StatusValue};
pub use page::{Page, PageRequest};
