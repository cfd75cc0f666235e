//! Parcel repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist parcels under a category and record trip-stage timestamps.
//! - Batch-load parcels for category listings (eager loads and
//!   categorised views) in one query per page.
//!
//! # Invariants
//! - Parcels can only be created under a visible category.
//! - A parcel has at most one trip-status row; recording a stage upserts it.

use crate::model::category::CategoryId;
use crate::model::parcel::{Parcel, ParcelId, Payer, TripStage, TripStatus};
use crate::repo::category_repo::{RepoError, RepoResult};
use crate::repo::schema::{
    ensure_schema_version, ensure_table, CATEGORY_COLUMNS, PARCEL_COLUMNS, TRIP_STATUS_COLUMNS,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use uuid::Uuid;

const PARCEL_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.parcel_category_id AS parcel_category_id,
    p.tracking_code AS tracking_code,
    p.payer AS payer,
    p.created_at AS created_at,
    ts.parcel_id AS ts_parcel_id,
    ts.pending AS pending,
    ts.accepted AS accepted,
    ts.ongoing AS ongoing,
    ts.completed AS completed,
    ts.cancelled AS cancelled,
    ts.returned AS returned
FROM parcels p
LEFT JOIN parcel_trip_statuses ts ON ts.parcel_id = p.id";

/// Repository interface for parcels owned by categories.
pub trait ParcelRepository {
    fn create_parcel(&self, parcel: &Parcel) -> RepoResult<ParcelId>;
    /// Sets the timestamp of one trip stage, creating the status row if needed.
    fn record_trip_stage(
        &self,
        parcel_id: ParcelId,
        stage: TripStage,
        at_epoch_ms: i64,
    ) -> RepoResult<()>;
    fn get_parcel(&self, id: ParcelId) -> RepoResult<Option<Parcel>>;
    /// Parcels of one category, newest first, with trip status.
    fn list_for_category(&self, category_id: CategoryId) -> RepoResult<Vec<Parcel>>;
}

/// SQLite-backed parcel repository.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_version(conn)?;
        ensure_table(conn, "parcel_categories", CATEGORY_COLUMNS)?;
        ensure_table(conn, "parcels", PARCEL_COLUMNS)?;
        ensure_table(conn, "parcel_trip_statuses", TRIP_STATUS_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn create_parcel(&self, parcel: &Parcel) -> RepoResult<ParcelId> {
        if parcel.tracking_code.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "parcel tracking_code must not be blank".to_string(),
            ));
        }

        let category_visible: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM parcel_categories
                WHERE id = ?1 AND deleted_at IS NULL
            );",
            [parcel.category_id.to_string()],
            |row| row.get(0),
        )?;
        if category_visible != 1 {
            return Err(RepoError::category_not_found(parcel.category_id));
        }

        self.conn.execute(
            "INSERT INTO parcels (
                id,
                parcel_category_id,
                tracking_code,
                payer,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                parcel.id.to_string(),
                parcel.category_id.to_string(),
                parcel.tracking_code.trim(),
                parcel.payer.as_db(),
                parcel.created_at,
            ],
        )?;

        if let Some(status) = parcel.trip_status {
            for stage in TripStage::ALL {
                if let Some(at) = status.get(stage) {
                    self.record_trip_stage(parcel.id, stage, at)?;
                }
            }
        }

        info!(
            "event=parcel_create module=repo status=ok id={} category_id={}",
            parcel.id, parcel.category_id
        );
        Ok(parcel.id)
    }

    fn record_trip_stage(
        &self,
        parcel_id: ParcelId,
        stage: TripStage,
        at_epoch_ms: i64,
    ) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM parcels WHERE id = ?1);",
            [parcel_id.to_string()],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound {
                entity: "parcel",
                key: format!("id={parcel_id}"),
            });
        }

        let column = stage.column();
        self.conn.execute(
            &format!(
                "INSERT INTO parcel_trip_statuses (parcel_id, {column})
                 VALUES (?1, ?2)
                 ON CONFLICT (parcel_id) DO UPDATE SET {column} = excluded.{column};"
            ),
            params![parcel_id.to_string(), at_epoch_ms],
        )?;
        Ok(())
    }

    fn get_parcel(&self, id: ParcelId) -> RepoResult<Option<Parcel>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE p.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_parcel_row(row)?));
        }
        Ok(None)
    }

    fn list_for_category(&self, category_id: CategoryId) -> RepoResult<Vec<Parcel>> {
        let mut grouped = load_parcels_for(self.conn, &[category_id], None)?;
        Ok(grouped.remove(&category_id).unwrap_or_default())
    }
}

/// Loads parcels of `category_ids`, grouped by category, newest first.
///
/// With `reached`, only parcels whose trip status has that stage set are
/// returned.
pub(crate) fn load_parcels_for(
    conn: &Connection,
    category_ids: &[CategoryId],
    reached: Option<TripStage>,
) -> RepoResult<HashMap<CategoryId, Vec<Parcel>>> {
    let mut grouped: HashMap<CategoryId, Vec<Parcel>> = HashMap::new();
    if category_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders = vec!["?"; category_ids.len()].join(", ");
    let mut sql = format!("{PARCEL_SELECT_SQL} WHERE p.parcel_category_id IN ({placeholders})");
    if let Some(stage) = reached {
        sql.push_str(&format!(" AND ts.{} IS NOT NULL", stage.column()));
    }
    sql.push_str(" ORDER BY p.created_at DESC, p.id DESC");

    let binds: Vec<Value> = category_ids
        .iter()
        .map(|id| Value::Text(id.to_string()))
        .collect();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    while let Some(row) = rows.next()? {
        let parcel = parse_parcel_row(row)?;
        grouped.entry(parcel.category_id).or_default().push(parcel);
    }
    Ok(grouped)
}

fn parse_parcel_row(row: &Row<'_>) -> RepoResult<Parcel> {
    let id = parse_uuid(row.get("id")?, "parcels.id")?;
    let category_id = parse_uuid(row.get("parcel_category_id")?, "parcels.parcel_category_id")?;

    let payer_text: String = row.get("payer")?;
    let payer = Payer::parse(&payer_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid payer `{payer_text}` in parcels.payer"))
    })?;

    let trip_status = match row.get::<_, Option<String>>("ts_parcel_id")? {
        Some(_) => Some(TripStatus {
            pending: row.get("pending")?,
            accepted: row.get("accepted")?,
            ongoing: row.get("ongoing")?,
            completed: row.get("completed")?,
            cancelled: row.get("cancelled")?,
            returned: row.get("returned")?,
        }),
        None => None,
    };

    Ok(Parcel {
        id,
        category_id,
        tracking_code: row.get("tracking_code")?,
        payer,
        created_at: row.get("created_at")?,
        trip_status,
    })
}

fn parse_uuid(value: String, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}
