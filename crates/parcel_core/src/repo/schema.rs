//! Connection readiness checks shared by the SQLite repositories.

use crate::db::migrations::{current_user_version, latest_version};
use crate::repo::category_repo::{RepoError, RepoResult};
use rusqlite::Connection;
use std::collections::BTreeSet;

pub(crate) const CATEGORY_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "image",
    "is_active",
    "created_at",
    "updated_at",
    "deleted_at",
];

pub(crate) const PARCEL_COLUMNS: &[&str] = &[
    "id",
    "parcel_category_id",
    "tracking_code",
    "payer",
    "created_at",
];

pub(crate) const TRIP_STATUS_COLUMNS: &[&str] = &[
    "parcel_id",
    "pending",
    "accepted",
    "ongoing",
    "completed",
    "cancelled",
    "returned",
];

pub(crate) fn ensure_schema_version(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Verifies `table` and its `required` columns, returning all its columns.
pub(crate) fn ensure_table(
    conn: &Connection,
    table: &'static str,
    required: &[&'static str],
) -> RepoResult<BTreeSet<String>> {
    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }

    let columns = table_columns(conn, table)?;
    for column in required {
        if !columns.contains(*column) {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }
    Ok(columns)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = BTreeSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
