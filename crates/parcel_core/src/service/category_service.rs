//! Parcel category use-case service.
//!
//! # Responsibility
//! - Validate form-shaped requests (every field optional) into typed
//!   `NewCategory` / `CategoryUpdate` commands.
//! - Delegate persistence and listings to repository implementations.
//!
//! # Invariants
//! - A request missing a required field never reaches the repository.
//! - An update carrying `status` only touches the active flag, whatever
//!   else it carries.

use crate::listing::{CategoryFilter, Page, PageRequest};
use crate::model::category::{
    CategoryId, CategoryUpdate, CategoryValidationError, ImagePayload, NewCategory,
    ParcelCategory,
};
use crate::model::parcel::TripStage;
use crate::repo::category_repo::{
    CategorizedParcels, CategoryExportRow, CategoryListItem, ParcelCategoryRepository,
    RepoResult, TrashRepository,
};
use rusqlite::types::Value;
use serde::Deserialize;

/// Create request as submitted by a form. Legacy field names are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CreateCategoryRequest {
    #[serde(alias = "category_name")]
    pub name: Option<String>,
    #[serde(alias = "short_desc")]
    pub description: Option<String>,
    #[serde(alias = "category_icon")]
    pub icon: Option<ImagePayload>,
}

impl CreateCategoryRequest {
    pub fn into_command(self) -> Result<NewCategory, CategoryValidationError> {
        let command = NewCategory {
            name: self.name.ok_or(CategoryValidationError::MissingField("name"))?,
            description: self
                .description
                .ok_or(CategoryValidationError::MissingField("description"))?,
            icon: self.icon.ok_or(CategoryValidationError::MissingField("icon"))?,
        };
        command.validate()?;
        Ok(command)
    }
}

/// Update request; `status` selects the status-only mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateCategoryRequest {
    pub status: Option<bool>,
    #[serde(alias = "category_name")]
    pub name: Option<String>,
    #[serde(alias = "short_desc")]
    pub description: Option<String>,
    #[serde(alias = "category_icon")]
    pub icon: Option<ImagePayload>,
}

impl UpdateCategoryRequest {
    pub fn into_command(self) -> Result<CategoryUpdate, CategoryValidationError> {
        if let Some(status) = self.status {
            return Ok(CategoryUpdate::Status(status));
        }

        let command = CategoryUpdate::Details {
            name: self.name.ok_or(CategoryValidationError::MissingField("name"))?,
            description: self
                .description
                .ok_or(CategoryValidationError::MissingField("description"))?,
            icon: self.icon,
        };
        command.validate()?;
        Ok(command)
    }
}

/// Use-case service wrapper for parcel category operations.
pub struct ParcelCategoryService<R> {
    repo: R,
}

impl<R: ParcelCategoryRepository> ParcelCategoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn list(
        &self,
        filter: &CategoryFilter,
        page: PageRequest,
    ) -> RepoResult<Page<CategoryListItem>> {
        self.repo.list(filter, page)
    }

    /// Listing entry point taking raw handler arguments.
    pub fn list_with(
        &self,
        filter: &CategoryFilter,
        page_size: u32,
        offset_or_number: u64,
        uses_direct_offset: bool,
    ) -> RepoResult<Page<CategoryListItem>> {
        self.repo.list(
            filter,
            PageRequest::new(page_size, offset_or_number, uses_direct_offset),
        )
    }

    pub fn get(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        self.repo.get(id)
    }

    pub fn get_by_column(&self, column: &str, value: Value) -> RepoResult<ParcelCategory> {
        self.repo.get_by_column(column, value)
    }

    /// Validates and creates a category.
    ///
    /// Returns `RepoError::Validation` for missing or blank fields.
    pub fn create_category(&self, request: CreateCategoryRequest) -> RepoResult<ParcelCategory> {
        let command = request.into_command()?;
        self.repo.create(&command)
    }

    /// Validates and applies an update.
    ///
    /// Returns `RepoError::NotFound` when `id` is not a visible category.
    pub fn update_category(
        &self,
        request: UpdateCategoryRequest,
        id: CategoryId,
    ) -> RepoResult<ParcelCategory> {
        let command = request.into_command()?;
        self.repo.update(&command, id)
    }

    pub fn delete_category(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        self.repo.delete(id)
    }

    pub fn categorized_list(
        &self,
        filter: &CategoryFilter,
        stage: TripStage,
        page: PageRequest,
    ) -> RepoResult<Page<CategorizedParcels>> {
        self.repo.categorized_list(filter, stage, page)
    }

    pub fn export(&self, filter: &CategoryFilter) -> RepoResult<Vec<CategoryExportRow>> {
        self.repo.export(filter)
    }
}

impl<R> ParcelCategoryService<R>
where
    R: ParcelCategoryRepository
        + TrashRepository<
            Id = CategoryId,
            Filter = CategoryFilter,
            Record = ParcelCategory,
            Listed = CategoryListItem,
        >,
{
    pub fn trashed_list(
        &self,
        filter: &CategoryFilter,
        page: u32,
    ) -> RepoResult<Page<CategoryListItem>> {
        self.repo.trashed_list(filter, page)
    }

    pub fn restore(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        self.repo.restore(id)
    }

    pub fn permanent_delete(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        self.repo.permanent_delete(id)
    }
}
