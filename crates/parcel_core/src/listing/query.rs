//! SQL composition for listings.
//!
//! Each optional filter becomes at most one `Predicate`; repositories fold
//! the predicates that are present over a `SelectBuilder` and run the
//! resulting page and count statements with the same bindings.

use crate::listing::filter::{CategoryFilter, CategoryRelation, StatusValue};
use crate::model::category::CategoryId;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::collections::BTreeSet;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Column sets of the tables filters may reference.
#[derive(Debug, Clone, Default)]
pub(crate) struct ListingSchema {
    pub category_columns: BTreeSet<String>,
    pub parcel_columns: BTreeSet<String>,
}

impl ListingSchema {
    fn columns_of(&self, relation: CategoryRelation) -> &BTreeSet<String> {
        match relation {
            CategoryRelation::Parcels => &self.parcel_columns,
        }
    }

    /// Whether `column` is a safe identifier and exists on the category table.
    pub fn has_category_column(&self, column: &str) -> bool {
        is_identifier(column) && self.category_columns.contains(column)
    }
}

pub(crate) fn is_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Which soft-delete state a listing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Visible,
    Trashed,
}

/// How the status value is compared against the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusMatch {
    /// `active` → 1, anything else → 0.
    Flag,
    /// `active` → 1, `inactive` → 0, other values compared literally.
    Literal,
}

/// One `WHERE` conjunct over `parcel_categories`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Lifecycle(Visibility),
    NameContainsAll(Vec<String>),
    ColumnEquals { column: String, value: Value },
    HasRelated {
        relation: CategoryRelation,
        column: String,
        value: String,
    },
    ExcludeIds(Vec<CategoryId>),
}

impl Predicate {
    pub fn render(&self) -> (String, Vec<Value>) {
        match self {
            Self::Lifecycle(Visibility::Visible) => {
                ("parcel_categories.deleted_at IS NULL".to_string(), Vec::new())
            }
            Self::Lifecycle(Visibility::Trashed) => (
                "parcel_categories.deleted_at IS NOT NULL".to_string(),
                Vec::new(),
            ),
            Self::NameContainsAll(tokens) => {
                let clause = tokens
                    .iter()
                    .map(|_| "parcel_categories.name LIKE ? ESCAPE '\\'")
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let binds = tokens
                    .iter()
                    .map(|token| Value::Text(format!("%{}%", escape_like(token))))
                    .collect();
                (format!("({clause})"), binds)
            }
            Self::ColumnEquals { column, value } => (
                format!("parcel_categories.\"{column}\" = ?"),
                vec![value.clone()],
            ),
            Self::HasRelated {
                relation,
                column,
                value,
            } => (
                format!(
                    "EXISTS (SELECT 1 FROM {table} rel WHERE rel.{fk} = parcel_categories.id AND rel.\"{column}\" = ?)",
                    table = relation.table(),
                    fk = relation.foreign_key(),
                ),
                vec![Value::Text(value.clone())],
            ),
            Self::ExcludeIds(ids) => {
                let placeholders = vec!["?"; ids.len()].join(", ");
                (
                    format!("parcel_categories.id NOT IN ({placeholders})"),
                    ids.iter().map(|id| Value::Text(id.to_string())).collect(),
                )
            }
        }
    }
}

/// Accumulates `WHERE` conjuncts and their positional bindings.
#[derive(Debug, Clone, Default)]
pub(crate) struct SelectBuilder {
    clauses: Vec<String>,
    binds: Vec<Value>,
}

impl SelectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `predicate` when present; absent inputs leave the query unchanged.
    pub fn and(mut self, predicate: Option<Predicate>) -> Self {
        if let Some(predicate) = predicate {
            let (clause, binds) = predicate.render();
            self.clauses.push(clause);
            self.binds.extend(binds);
        }
        self
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    /// Page statement: `select` + filters + newest-first order + window.
    pub fn page_sql(&self, select: &str, limit: u32, offset: u64) -> (String, Vec<Value>) {
        let sql = format!(
            "{select}{} ORDER BY parcel_categories.created_at DESC, parcel_categories.id DESC LIMIT ? OFFSET ?",
            self.where_sql()
        );
        let mut binds = self.binds.clone();
        binds.push(Value::Integer(i64::from(limit)));
        binds.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        (sql, binds)
    }

    /// Unwindowed statement in listing order.
    pub fn all_sql(&self, select: &str) -> (String, Vec<Value>) {
        let sql = format!(
            "{select}{} ORDER BY parcel_categories.created_at DESC, parcel_categories.id DESC",
            self.where_sql()
        );
        (sql, self.binds.clone())
    }

    pub fn count_sql(&self) -> (String, Vec<Value>) {
        (
            format!(
                "SELECT COUNT(*) FROM parcel_categories{}",
                self.where_sql()
            ),
            self.binds.clone(),
        )
    }
}

pub(crate) fn lifecycle_predicate(visibility: Visibility) -> Option<Predicate> {
    Some(Predicate::Lifecycle(visibility))
}

pub(crate) fn search_predicate(filter: &CategoryFilter) -> Option<Predicate> {
    let tokens = filter.search_tokens();
    if tokens.is_empty() {
        return None;
    }
    Some(Predicate::NameContainsAll(
        tokens.into_iter().map(str::to_string).collect(),
    ))
}

pub(crate) fn status_predicate(
    filter: &CategoryFilter,
    schema: &ListingSchema,
    default_column: Option<&str>,
    matching: StatusMatch,
) -> Option<Predicate> {
    if filter.status_value.is_all() {
        return None;
    }
    let column = filter.status_column_or(default_column)?;
    if !schema.has_category_column(column) {
        warn!("event=filter_skip module=listing status=skip filter=status reason=unknown_column");
        return None;
    }

    let value = match (matching, &filter.status_value) {
        (StatusMatch::Literal, StatusValue::Other(raw)) => Value::Text(raw.clone()),
        (_, status) => Value::Integer(i64::from(status.as_flag().unwrap_or(false))),
    };
    Some(Predicate::ColumnEquals {
        column: column.to_string(),
        value,
    })
}

pub(crate) fn related_predicate(
    filter: &CategoryFilter,
    schema: &ListingSchema,
) -> Option<Predicate> {
    let related = filter.related()?;
    let Some(relation) = CategoryRelation::parse(related.relation_name) else {
        warn!("event=filter_skip module=listing status=skip filter=related reason=unknown_relation");
        return None;
    };
    if !is_identifier(related.column) || !schema.columns_of(relation).contains(related.column) {
        warn!(
            "event=filter_skip module=listing status=skip filter=related reason=unknown_column relation={}",
            relation.name()
        );
        return None;
    }
    Some(Predicate::HasRelated {
        relation,
        column: related.column.to_string(),
        value: related.value.to_string(),
    })
}

pub(crate) fn exclusion_predicate(filter: &CategoryFilter) -> Option<Predicate> {
    if filter.excluded_ids.is_empty() {
        return None;
    }
    Some(Predicate::ExcludeIds(filter.excluded_ids.clone()))
}

fn escape_like(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for ch in token.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
