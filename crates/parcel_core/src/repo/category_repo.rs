//! Parcel category repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, soft-delete lifecycle and listing APIs over
//!   `parcel_categories`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Normal reads only see `deleted_at IS NULL` rows; trash APIs only see
//!   `deleted_at IS NOT NULL` rows.
//! - Listing order is `created_at DESC, id DESC` everywhere.
//! - Icons go through the `FileStore`; only the returned path is persisted.

use crate::config::{listing_config, ListingConfig};
use crate::db::{now_epoch_ms, DbError};
use crate::listing::filter::DEFAULT_STATUS_COLUMN;
use crate::listing::query::{
    exclusion_predicate, lifecycle_predicate, related_predicate, search_predicate,
    status_predicate, ListingSchema, SelectBuilder, StatusMatch, Visibility,
};
use crate::listing::{CategoryFilter, CategoryRelation, Page, PageRequest};
use crate::model::category::{
    CategoryId, CategoryUpdate, CategoryValidationError, Lifecycle, LifecycleError, NewCategory,
    ParcelCategory,
};
use crate::model::parcel::{Parcel, TripStage};
use crate::repo::parcel_repo::load_parcels_for;
use crate::repo::schema::{
    ensure_schema_version, ensure_table, CATEGORY_COLUMNS, PARCEL_COLUMNS, TRIP_STATUS_COLUMNS,
};
use crate::storage::{FileStore, StorageError};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Folder icons are stored under.
pub const CATEGORY_IMAGE_FOLDER: &str = "parcel/category/";
/// Extension of stored icons.
pub const CATEGORY_IMAGE_EXTENSION: &str = "png";

const CATEGORY_SELECT_SQL: &str = "SELECT
    parcel_categories.id AS id,
    parcel_categories.name AS name,
    parcel_categories.description AS description,
    parcel_categories.image AS image,
    parcel_categories.is_active AS is_active,
    parcel_categories.created_at AS created_at,
    parcel_categories.updated_at AS updated_at,
    parcel_categories.deleted_at AS deleted_at
FROM parcel_categories";

const CATEGORY_EXPORT_SQL: &str = "SELECT
    parcel_categories.id AS id,
    parcel_categories.name AS name,
    parcel_categories.description AS description,
    parcel_categories.image AS image,
    parcel_categories.is_active AS is_active,
    parcel_categories.created_at AS created_at,
    parcel_categories.updated_at AS updated_at,
    parcel_categories.deleted_at AS deleted_at,
    (
        SELECT COUNT(*)
        FROM parcels p
        INNER JOIN parcel_trip_statuses ts ON ts.parcel_id = p.id
        WHERE p.parcel_category_id = parcel_categories.id
          AND ts.completed IS NOT NULL
    ) AS total_delivered
FROM parcel_categories";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for catalogue persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(CategoryValidationError),
    Lifecycle(LifecycleError),
    Db(DbError),
    Storage(StorageError),
    /// Lookup matched no row in the expected lifecycle state.
    NotFound {
        entity: &'static str,
        key: String,
    },
    /// Lookup column is not a column of the table.
    InvalidColumn(String),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub(crate) fn category_not_found(id: CategoryId) -> Self {
        Self::NotFound {
            entity: "parcel category",
            key: format!("id={id}"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Lifecycle(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "file storage failed: {err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::InvalidColumn(column) => write!(f, "unknown lookup column `{column}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "catalogue repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "catalogue repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "catalogue repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Lifecycle(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CategoryValidationError> for RepoError {
    fn from(value: CategoryValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LifecycleError> for RepoError {
    fn from(value: LifecycleError) -> Self {
        Self::Lifecycle(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Listing row: the category plus any eager-loaded relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryListItem {
    #[serde(flatten)]
    pub category: ParcelCategory,
    /// Present only when `parcels` was requested as an eager relation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parcels: Option<Vec<Parcel>>,
}

/// Category with the parcels that reached a given trip stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorizedParcels {
    #[serde(flatten)]
    pub category: ParcelCategory,
    pub parcels: Vec<Parcel>,
}

/// Export row with the number of delivered parcels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryExportRow {
    #[serde(flatten)]
    pub category: ParcelCategory,
    pub total_delivered: u64,
}

/// Repository interface for parcel category operations.
pub trait ParcelCategoryRepository {
    /// Filtered, newest-first page of visible categories.
    fn list(&self, filter: &CategoryFilter, page: PageRequest)
        -> RepoResult<Page<CategoryListItem>>;
    /// Exactly one visible category where `column = value`.
    fn get_by_column(&self, column: &str, value: Value) -> RepoResult<ParcelCategory>;
    fn create(&self, new: &NewCategory) -> RepoResult<ParcelCategory>;
    fn update(&self, update: &CategoryUpdate, id: CategoryId) -> RepoResult<ParcelCategory>;
    /// Soft-deletes a visible category.
    fn delete(&self, id: CategoryId) -> RepoResult<ParcelCategory>;
    /// Categories with their parcels whose trip reached `stage`.
    fn categorized_list(
        &self,
        filter: &CategoryFilter,
        stage: TripStage,
        page: PageRequest,
    ) -> RepoResult<Page<CategorizedParcels>>;
    /// All matching categories with delivered-parcel counts, unpaginated.
    fn export(&self, filter: &CategoryFilter) -> RepoResult<Vec<CategoryExportRow>>;

    fn get(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        self.get_by_column("id", Value::Text(id.to_string()))
    }
}

/// Trash contract shared by soft-deletable entities.
pub trait TrashRepository {
    type Id;
    type Filter;
    type Record;
    type Listed;

    /// Page of trashed records at the configured default page size.
    fn trashed_list(&self, filter: &Self::Filter, page: u32) -> RepoResult<Page<Self::Listed>>;
    /// Brings a trashed record back; `NotFound` unless it is in trash.
    fn restore(&self, id: Self::Id) -> RepoResult<Self::Record>;
    /// Irreversibly removes a trashed record; `NotFound` unless it is in trash.
    fn permanent_delete(&self, id: Self::Id) -> RepoResult<Self::Record>;
}

/// SQLite-backed parcel category repository.
pub struct SqliteParcelCategoryRepository<'conn, F> {
    conn: &'conn Connection,
    files: F,
    schema: ListingSchema,
    listing: ListingConfig,
}

impl<'conn, F: FileStore> SqliteParcelCategoryRepository<'conn, F> {
    /// Constructs a repository from a migrated connection.
    ///
    /// Pagination defaults come from the process-wide listing config.
    pub fn try_new(conn: &'conn Connection, files: F) -> RepoResult<Self> {
        ensure_schema_version(conn)?;
        let category_columns = ensure_table(conn, "parcel_categories", CATEGORY_COLUMNS)?;
        let parcel_columns = ensure_table(conn, "parcels", PARCEL_COLUMNS)?;
        ensure_table(conn, "parcel_trip_statuses", TRIP_STATUS_COLUMNS)?;

        Ok(Self {
            conn,
            files,
            schema: ListingSchema {
                category_columns,
                parcel_columns,
            },
            listing: listing_config(),
        })
    }

    /// Overrides pagination defaults for this repository.
    ///
    /// An invalid config is kept but page sizes still resolve to at least
    /// one row.
    pub fn with_listing_config(mut self, listing: ListingConfig) -> Self {
        if let Err(err) = listing.validate() {
            warn!("event=listing_config module=repo status=invalid error={err}");
        }
        self.listing = listing;
        self
    }

    /// Best-effort removal of a stored icon; failures are logged only.
    fn discard_image(&self, path: &str, reason: &str) {
        if let Err(err) = self.files.remove(path) {
            warn!("event=file_discard module=repo status=error reason={reason} error={err}");
        }
    }

    pub fn listing_config(&self) -> ListingConfig {
        self.listing
    }

    fn query_categories(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<ParcelCategory>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }

    fn count(&self, builder: &SelectBuilder) -> RepoResult<u64> {
        let (sql, binds) = builder.count_sql();
        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn page_of(
        &self,
        builder: &SelectBuilder,
        page: PageRequest,
        echo: BTreeMap<String, String>,
    ) -> RepoResult<Page<ParcelCategory>> {
        let window = page.resolve(&self.listing);
        let total = self.count(builder)?;
        let (sql, binds) = builder.page_sql(CATEGORY_SELECT_SQL, window.limit, window.offset);
        let categories = self.query_categories(&sql, binds)?;
        Ok(Page::new(categories, total, window, echo))
    }

    fn with_relations(
        &self,
        page: Page<ParcelCategory>,
        relations: &[CategoryRelation],
    ) -> RepoResult<Page<CategoryListItem>> {
        if !relations.contains(&CategoryRelation::Parcels) {
            return Ok(page.map(|category| CategoryListItem {
                category,
                parcels: None,
            }));
        }

        let ids: Vec<CategoryId> = page.items.iter().map(|category| category.id).collect();
        let mut parcels = load_parcels_for(self.conn, &ids, None)?;
        Ok(page.map(|category| {
            let loaded = parcels.remove(&category.id).unwrap_or_default();
            CategoryListItem {
                category,
                parcels: Some(loaded),
            }
        }))
    }

    fn find_trashed(&self, id: CategoryId) -> RepoResult<Option<ParcelCategory>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE parcel_categories.id = ?1
               AND parcel_categories.deleted_at IS NOT NULL;"
        ))?;
        let category = stmt
            .query_row([id.to_string()], |row| Ok(parse_category_row(row)))
            .optional()?
            .transpose()?;
        Ok(category)
    }
}

impl<F: FileStore> ParcelCategoryRepository for SqliteParcelCategoryRepository<'_, F> {
    fn list(
        &self,
        filter: &CategoryFilter,
        page: PageRequest,
    ) -> RepoResult<Page<CategoryListItem>> {
        let started_at = Instant::now();
        let builder = SelectBuilder::new()
            .and(lifecycle_predicate(Visibility::Visible))
            .and(search_predicate(filter))
            .and(status_predicate(
                filter,
                &self.schema,
                Some(DEFAULT_STATUS_COLUMN),
                StatusMatch::Flag,
            ))
            .and(related_predicate(filter, &self.schema))
            .and(exclusion_predicate(filter));

        let echo = echo_params(filter, Some(DEFAULT_STATUS_COLUMN));
        let page = self.page_of(&builder, page, echo)?;
        let page = self.with_relations(page, &filter.eager_load())?;

        info!(
            "event=category_list module=repo status=ok total={} returned={} duration_ms={}",
            page.total,
            page.len(),
            started_at.elapsed().as_millis()
        );
        Ok(page)
    }

    fn get_by_column(&self, column: &str, value: Value) -> RepoResult<ParcelCategory> {
        if !self.schema.has_category_column(column) {
            return Err(RepoError::InvalidColumn(column.to_string()));
        }

        let key = format!("{column}={}", value_label(&value));
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE parcel_categories.\"{column}\" = ?1
               AND parcel_categories.deleted_at IS NULL
             ORDER BY parcel_categories.created_at DESC, parcel_categories.id DESC
             LIMIT 1;"
        ))?;
        let category = stmt
            .query_row([value], |row| Ok(parse_category_row(row)))
            .optional()?
            .transpose()?;
        category.ok_or(RepoError::NotFound {
            entity: "parcel category",
            key,
        })
    }

    fn create(&self, new: &NewCategory) -> RepoResult<ParcelCategory> {
        new.validate()?;

        let image = self.files.store(
            CATEGORY_IMAGE_FOLDER,
            CATEGORY_IMAGE_EXTENSION,
            &new.icon.bytes,
            None,
        )?;
        let id = Uuid::now_v7();
        let now = now_epoch_ms();
        let inserted = self.conn.execute(
            "INSERT INTO parcel_categories (
                id,
                name,
                description,
                image,
                is_active,
                created_at,
                updated_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5, NULL);",
            params![
                id.to_string(),
                new.name.trim(),
                new.description.trim(),
                image,
                now
            ],
        );
        if let Err(err) = inserted {
            self.discard_image(&image, "insert_failed");
            return Err(err.into());
        }

        info!("event=category_create module=repo status=ok id={id}");
        self.get(id)
    }

    fn update(&self, update: &CategoryUpdate, id: CategoryId) -> RepoResult<ParcelCategory> {
        let current = self.get(id)?;
        update.validate()?;
        let now = now_epoch_ms();

        match update {
            CategoryUpdate::Status(is_active) => {
                self.conn.execute(
                    "UPDATE parcel_categories
                     SET is_active = ?2, updated_at = ?3
                     WHERE id = ?1 AND deleted_at IS NULL;",
                    params![id.to_string(), bool_to_int(*is_active), now],
                )?;
                info!("event=category_update module=repo status=ok mode=status id={id}");
            }
            CategoryUpdate::Details {
                name,
                description,
                icon,
            } => {
                let replacement = match icon {
                    Some(icon) => Some(self.files.store(
                        CATEGORY_IMAGE_FOLDER,
                        CATEGORY_IMAGE_EXTENSION,
                        &icon.bytes,
                        None,
                    )?),
                    None => None,
                };
                let image = replacement.as_ref().or(current.image.as_ref());
                let updated = self.conn.execute(
                    "UPDATE parcel_categories
                     SET name = ?2, description = ?3, image = ?4, updated_at = ?5
                     WHERE id = ?1 AND deleted_at IS NULL;",
                    params![
                        id.to_string(),
                        name.trim(),
                        description.trim(),
                        image,
                        now
                    ],
                );
                if let Err(err) = updated {
                    if let Some(path) = replacement.as_deref() {
                        self.discard_image(path, "update_failed");
                    }
                    return Err(err.into());
                }
                // The row no longer references the old icon.
                if let (Some(_), Some(previous)) = (&replacement, current.image.as_deref()) {
                    if !previous.trim().is_empty() {
                        self.discard_image(previous, "superseded");
                    }
                }
                info!(
                    "event=category_update module=repo status=ok mode=details id={id} icon_replaced={}",
                    icon.is_some()
                );
            }
        }

        self.get(id)
    }

    fn delete(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        let mut category = self.get(id)?;
        let now = now_epoch_ms();
        category.trash(now)?;

        let changed = self.conn.execute(
            "UPDATE parcel_categories
             SET deleted_at = ?2
             WHERE id = ?1 AND deleted_at IS NULL;",
            params![id.to_string(), now],
        )?;
        if changed == 0 {
            return Err(RepoError::category_not_found(id));
        }

        info!("event=category_trash module=repo status=ok id={id}");
        Ok(category)
    }

    fn categorized_list(
        &self,
        filter: &CategoryFilter,
        stage: TripStage,
        page: PageRequest,
    ) -> RepoResult<Page<CategorizedParcels>> {
        let builder = SelectBuilder::new()
            .and(lifecycle_predicate(Visibility::Visible))
            .and(search_predicate(filter))
            .and(status_predicate(
                filter,
                &self.schema,
                None,
                StatusMatch::Literal,
            ));

        let page = self.page_of(&builder, page, echo_params(filter, None))?;
        let ids: Vec<CategoryId> = page.items.iter().map(|category| category.id).collect();
        let mut parcels = load_parcels_for(self.conn, &ids, Some(stage))?;

        info!(
            "event=category_categorized module=repo status=ok stage={} total={}",
            stage.column(),
            page.total
        );
        Ok(page.map(|category| {
            let parcels = parcels.remove(&category.id).unwrap_or_default();
            CategorizedParcels { category, parcels }
        }))
    }

    fn export(&self, filter: &CategoryFilter) -> RepoResult<Vec<CategoryExportRow>> {
        let builder = SelectBuilder::new()
            .and(lifecycle_predicate(Visibility::Visible))
            .and(search_predicate(filter))
            .and(status_predicate(
                filter,
                &self.schema,
                None,
                StatusMatch::Literal,
            ));

        let (sql, binds) = builder.all_sql(CATEGORY_EXPORT_SQL);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut exported = Vec::new();
        while let Some(row) = rows.next()? {
            let total_delivered: i64 = row.get("total_delivered")?;
            exported.push(CategoryExportRow {
                category: parse_category_row(row)?,
                total_delivered: u64::try_from(total_delivered).unwrap_or(0),
            });
        }

        info!(
            "event=category_export module=repo status=ok rows={}",
            exported.len()
        );
        Ok(exported)
    }
}

impl<F: FileStore> TrashRepository for SqliteParcelCategoryRepository<'_, F> {
    type Id = CategoryId;
    type Filter = CategoryFilter;
    type Record = ParcelCategory;
    type Listed = CategoryListItem;

    fn trashed_list(
        &self,
        filter: &CategoryFilter,
        page: u32,
    ) -> RepoResult<Page<CategoryListItem>> {
        let builder = SelectBuilder::new()
            .and(lifecycle_predicate(Visibility::Trashed))
            .and(search_predicate(filter));

        let mut echo = BTreeMap::new();
        echo.insert(
            "search".to_string(),
            filter.search_text().unwrap_or_default().to_string(),
        );
        let request = PageRequest::page(page, self.listing.default_page_size);
        let page = self.page_of(&builder, request, echo)?;
        self.with_relations(page, &filter.eager_load())
    }

    fn restore(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        let mut category = self
            .find_trashed(id)?
            .ok_or_else(|| RepoError::category_not_found(id))?;
        category.restore()?;
        let now = now_epoch_ms();

        self.conn.execute(
            "UPDATE parcel_categories
             SET deleted_at = NULL, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NOT NULL;",
            params![id.to_string(), now],
        )?;
        category.updated_at = now;

        info!("event=category_restore module=repo status=ok id={id}");
        Ok(category)
    }

    fn permanent_delete(&self, id: CategoryId) -> RepoResult<ParcelCategory> {
        let category = self
            .find_trashed(id)?
            .ok_or_else(|| RepoError::category_not_found(id))?;

        self.conn.execute(
            "DELETE FROM parcel_categories WHERE id = ?1 AND deleted_at IS NOT NULL;",
            [id.to_string()],
        )?;

        info!("event=category_purge module=repo status=ok id={id}");
        Ok(category)
    }
}

/// Parameters echoed into page links: search text, resolved status column
/// and raw status value.
fn echo_params(filter: &CategoryFilter, default_column: Option<&str>) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "search".to_string(),
            filter.search_text().unwrap_or_default().to_string(),
        ),
        (
            "query".to_string(),
            filter
                .status_column_or(default_column)
                .unwrap_or_default()
                .to_string(),
        ),
        (
            "value".to_string(),
            filter.status_value.as_raw().to_string(),
        ),
    ])
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<ParcelCategory> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{id_text}` in parcel_categories.id"
        ))
    })?;

    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in parcel_categories.is_active"
            )));
        }
    };

    Ok(ParcelCategory {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        image: row.get("image")?,
        is_active,
        lifecycle: Lifecycle::from_deleted_at(row.get("deleted_at")?),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn value_label(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
