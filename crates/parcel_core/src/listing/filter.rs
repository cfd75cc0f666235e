//! Typed listing filters.

use crate::model::category::CategoryId;
use log::warn;
use serde::{Deserialize, Serialize};

/// Status column filtered when the caller names none.
pub const DEFAULT_STATUS_COLUMN: &str = "is_active";

/// Requested value for the status column filter.
///
/// Serialized as its raw string so it round-trips through query strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusValue {
    /// Filter not applied. Only `all` itself or an absent value selects it.
    #[default]
    All,
    Active,
    Inactive,
    /// Any other raw value.
    Other(String),
}

impl StatusValue {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "all" => Self::All,
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_raw(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Other(value) => value.as_str(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Boolean reading: `active` is true, every other value false, `all`
    /// applies no filter.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::All => None,
            Self::Active => Some(true),
            Self::Inactive | Self::Other(_) => Some(false),
        }
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<StatusValue> for String {
    fn from(value: StatusValue) -> Self {
        value.as_raw().to_string()
    }
}

/// Relations a category can be filtered by or eager-load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRelation {
    Parcels,
}

impl CategoryRelation {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "parcels" => Some(Self::Parcels),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Parcels => "parcels",
        }
    }

    /// Table holding the related rows.
    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Parcels => "parcels",
        }
    }

    /// Column in `table()` referencing `parcel_categories.id`.
    pub(crate) fn foreign_key(self) -> &'static str {
        match self {
            Self::Parcels => "parcel_category_id",
        }
    }
}

/// Relation-existence filter with all three inputs present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedFilter<'a> {
    pub relation_name: &'a str,
    pub column: &'a str,
    pub value: &'a str,
}

/// Optional, combinable listing filters.
///
/// Every field defaults to "not applied". Blank strings count as absent.
/// Deserialization also accepts the legacy request keys (`query`, `value`,
/// `column_name`, `column_value`, `whereHas`, `except`, `relations`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFilter {
    /// Whitespace-separated tokens, each required as a substring of `name`.
    pub search: Option<String>,
    #[serde(alias = "query")]
    pub status_column: Option<String>,
    #[serde(alias = "value")]
    pub status_value: StatusValue,
    #[serde(alias = "column_name")]
    pub related_column: Option<String>,
    #[serde(alias = "column_value")]
    pub related_value: Option<String>,
    #[serde(alias = "whereHas")]
    pub relation_name: Option<String>,
    #[serde(alias = "except")]
    pub excluded_ids: Vec<CategoryId>,
    #[serde(alias = "relations")]
    pub eager_relations: Vec<String>,
}

impl CategoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, column: impl Into<String>, value: StatusValue) -> Self {
        self.status_column = Some(column.into());
        self.status_value = value;
        self
    }

    pub fn with_status_value(mut self, value: StatusValue) -> Self {
        self.status_value = value;
        self
    }

    pub fn with_related(
        mut self,
        relation_name: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.relation_name = Some(relation_name.into());
        self.related_column = Some(column.into());
        self.related_value = Some(value.into());
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = CategoryId>) -> Self {
        self.excluded_ids.extend(ids);
        self
    }

    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eager_relations
            .extend(relations.into_iter().map(Into::into));
        self
    }

    /// Trimmed search text, `None` when blank.
    pub fn search_text(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    /// Search tokens split on whitespace.
    pub fn search_tokens(&self) -> Vec<&str> {
        self.search_text()
            .map(|text| text.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Status column to filter on, falling back to `default` when unnamed.
    pub fn status_column_or<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        non_blank(self.status_column.as_deref()).or(default)
    }

    /// Relation-existence inputs, only when all three are present.
    pub fn related(&self) -> Option<RelatedFilter<'_>> {
        Some(RelatedFilter {
            relation_name: non_blank(self.relation_name.as_deref())?,
            column: non_blank(self.related_column.as_deref())?,
            value: non_blank(self.related_value.as_deref())?,
        })
    }

    /// Known eager relations in request order, without duplicates.
    pub fn eager_load(&self) -> Vec<CategoryRelation> {
        let mut relations = Vec::new();
        for name in &self.eager_relations {
            match CategoryRelation::parse(name) {
                Some(relation) if !relations.contains(&relation) => relations.push(relation),
                Some(_) => {}
                None => warn!(
                    "event=filter_skip module=listing status=skip filter=eager_load reason=unknown_relation"
                ),
            }
        }
        relations
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
