//! Parcel category catalogue core.
//! Owns category persistence, the soft-delete lifecycle and filtered listings.

pub mod config;
pub mod db;
pub mod listing;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use config::{load_config, pagination_limit, CoreConfig, ListingConfig};
pub use listing::{CategoryFilter, Page, PageRequest, StatusValue};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::category::{
    CategoryId, CategoryUpdate, CategoryValidationError, ImagePayload, Lifecycle, NewCategory,
    ParcelCategory,
};
pub use model::parcel::{Parcel, ParcelId, Payer, TripStage, TripStatus};
pub use repo::category_repo::{
    CategorizedParcels, CategoryExportRow, CategoryListItem, ParcelCategoryRepository, RepoError,
    RepoResult, SqliteParcelCategoryRepository, TrashRepository,
};
pub use repo::parcel_repo::{ParcelRepository, SqliteParcelRepository};
pub use service::category_service::{
    CreateCategoryRequest, ParcelCategoryService, UpdateCategoryRequest,
};
pub use storage::{FileStore, LocalFileStore, StorageError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
