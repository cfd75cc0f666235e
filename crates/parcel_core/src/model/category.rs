//! Parcel category domain model.
//!
//! # Responsibility
//! - Define the canonical category record and creation/update commands.
//! - Own the soft-delete lifecycle transitions.
//!
//! # Invariants
//! - `id` is stable and never reused for another category.
//! - `Lifecycle::Trashed` records are invisible to normal listings.
//! - Only `Active -> Trashed` and `Trashed -> Active` transitions are legal.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for parcel categories.
pub type CategoryId = Uuid;

/// Upper bound for an uploaded category icon.
pub const MAX_ICON_BYTES: usize = 2 * 1024 * 1024;

/// Soft-delete state of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    /// Visible to listings and lookups.
    Active,
    /// Logically removed; restorable until permanently deleted.
    Trashed {
        /// Unix epoch milliseconds of the soft delete.
        deleted_at: i64,
    },
}

impl Lifecycle {
    /// Builds the lifecycle from the nullable `deleted_at` column.
    pub fn from_deleted_at(deleted_at: Option<i64>) -> Self {
        match deleted_at {
            Some(deleted_at) => Self::Trashed { deleted_at },
            None => Self::Active,
        }
    }

    /// Column value persisted for this lifecycle.
    pub fn deleted_at(&self) -> Option<i64> {
        match self {
            Self::Active => None,
            Self::Trashed { deleted_at } => Some(*deleted_at),
        }
    }

    pub fn is_trashed(&self) -> bool {
        matches!(self, Self::Trashed { .. })
    }
}

/// Illegal lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    AlreadyTrashed,
    NotTrashed,
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyTrashed => write!(f, "category is already in trash"),
            Self::NotTrashed => write!(f, "category is not in trash"),
        }
    }
}

impl Error for LifecycleError {}

/// Canonical parcel category record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelCategory {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    /// Relative path returned by the file store.
    pub image: Option<String>,
    pub is_active: bool,
    pub lifecycle: Lifecycle,
    /// Unix epoch milliseconds; listings order by this, newest first.
    pub created_at: i64,
    pub updated_at: i64,
}

impl ParcelCategory {
    /// Moves the category into trash.
    pub fn trash(&mut self, at_epoch_ms: i64) -> Result<(), LifecycleError> {
        if self.lifecycle.is_trashed() {
            return Err(LifecycleError::AlreadyTrashed);
        }
        self.lifecycle = Lifecycle::Trashed {
            deleted_at: at_epoch_ms,
        };
        Ok(())
    }

    /// Brings a trashed category back.
    pub fn restore(&mut self) -> Result<(), LifecycleError> {
        if !self.lifecycle.is_trashed() {
            return Err(LifecycleError::NotTrashed);
        }
        self.lifecycle = Lifecycle::Active;
        Ok(())
    }

    /// Returns whether this category is visible to normal queries.
    pub fn is_visible(&self) -> bool {
        !self.lifecycle.is_trashed()
    }
}

/// Raw icon upload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Validated input for category creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub icon: ImagePayload,
}

impl NewCategory {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        icon: ImagePayload,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            icon,
        }
    }

    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)?;
        require_icon(&self.icon)
    }
}

/// Mutually exclusive category update modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryUpdate {
    /// Sets only the active flag.
    Status(bool),
    /// Replaces name and description, and the icon when one is given.
    Details {
        name: String,
        description: String,
        icon: Option<ImagePayload>,
    },
}

impl CategoryUpdate {
    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        match self {
            Self::Status(_) => Ok(()),
            Self::Details {
                name,
                description,
                icon,
            } => {
                require_text("name", name)?;
                require_text("description", description)?;
                match icon {
                    Some(icon) => require_icon(icon),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Validation errors for category commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryValidationError {
    /// A required field was not supplied at all.
    MissingField(&'static str),
    /// A required text field was blank after trimming.
    BlankField(&'static str),
    IconTooLarge { size: usize, max: usize },
}

impl Display for CategoryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "required field `{field}` is missing"),
            Self::BlankField(field) => write!(f, "required field `{field}` must not be blank"),
            Self::IconTooLarge { size, max } => {
                write!(f, "icon is {size} bytes, the limit is {max} bytes")
            }
        }
    }
}

impl Error for CategoryValidationError {}

fn require_text(field: &'static str, value: &str) -> Result<(), CategoryValidationError> {
    if value.trim().is_empty() {
        return Err(CategoryValidationError::BlankField(field));
    }
    Ok(())
}

fn require_icon(icon: &ImagePayload) -> Result<(), CategoryValidationError> {
    if icon.is_empty() {
        return Err(CategoryValidationError::MissingField("icon"));
    }
    if icon.bytes.len() > MAX_ICON_BYTES {
        return Err(CategoryValidationError::IconTooLarge {
            size: icon.bytes.len(),
            max: MAX_ICON_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParcelCategory {
        ParcelCategory {
            id: Uuid::now_v7(),
            name: "Documents".to_string(),
            description: "Paper only".to_string(),
            image: None,
            is_active: true,
            lifecycle: Lifecycle::Active,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn lifecycle_transitions_reject_illegal_moves() {
        let mut category = sample();
        assert_eq!(category.restore(), Err(LifecycleError::NotTrashed));

        category.trash(42).unwrap();
        assert_eq!(category.lifecycle, Lifecycle::Trashed { deleted_at: 42 });
        assert!(!category.is_visible());
        assert_eq!(category.trash(43), Err(LifecycleError::AlreadyTrashed));

        category.restore().unwrap();
        assert!(category.is_visible());
    }

    #[test]
    fn lifecycle_maps_deleted_at_column() {
        assert_eq!(Lifecycle::from_deleted_at(None), Lifecycle::Active);
        assert_eq!(Lifecycle::from_deleted_at(Some(7)).deleted_at(), Some(7));
    }

    #[test]
    fn new_category_requires_all_fields() {
        let missing_icon = NewCategory::new("Box", "Small boxes", ImagePayload::default());
        assert_eq!(
            missing_icon.validate(),
            Err(CategoryValidationError::MissingField("icon"))
        );

        let blank_name = NewCategory::new("  ", "Small boxes", ImagePayload::new(vec![1]));
        assert_eq!(
            blank_name.validate(),
            Err(CategoryValidationError::BlankField("name"))
        );

        let valid = NewCategory::new("Box", "Small boxes", ImagePayload::new(vec![1]));
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn status_update_skips_detail_validation() {
        assert!(CategoryUpdate::Status(false).validate().is_ok());

        let details = CategoryUpdate::Details {
            name: "Box".to_string(),
            description: String::new(),
            icon: None,
        };
        assert_eq!(
            details.validate(),
            Err(CategoryValidationError::BlankField("description"))
        );
    }
}
