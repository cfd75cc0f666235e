//! Parcel and trip-status records owned by a category.
//!
//! Parcels exist here only as far as category listings need them: as the
//! target of relation filters, eager loads and delivery counts.

use crate::model::category::CategoryId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ParcelId = Uuid;

/// Who pays for the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payer {
    Sender,
    Receiver,
}

impl Payer {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sender" => Some(Self::Sender),
            "receiver" => Some(Self::Receiver),
            _ => None,
        }
    }
}

/// Milestone of a parcel trip. Each maps to a nullable timestamp column of
/// `parcel_trip_statuses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStage {
    Pending,
    Accepted,
    Ongoing,
    Completed,
    Cancelled,
    Returned,
}

impl TripStage {
    pub const ALL: [TripStage; 6] = [
        TripStage::Pending,
        TripStage::Accepted,
        TripStage::Ongoing,
        TripStage::Completed,
        TripStage::Cancelled,
        TripStage::Returned,
    ];

    /// Column name in `parcel_trip_statuses`.
    pub fn column(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.column() == value.trim())
    }
}

/// Timestamps (epoch ms) of the trip milestones a parcel has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripStatus {
    pub pending: Option<i64>,
    pub accepted: Option<i64>,
    pub ongoing: Option<i64>,
    pub completed: Option<i64>,
    pub cancelled: Option<i64>,
    pub returned: Option<i64>,
}

impl TripStatus {
    pub fn get(&self, stage: TripStage) -> Option<i64> {
        match stage {
            TripStage::Pending => self.pending,
            TripStage::Accepted => self.accepted,
            TripStage::Ongoing => self.ongoing,
            TripStage::Completed => self.completed,
            TripStage::Cancelled => self.cancelled,
            TripStage::Returned => self.returned,
        }
    }

    pub fn reached(&self, stage: TripStage) -> bool {
        self.get(stage).is_some()
    }
}

/// Parcel record with its trip status when one was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: ParcelId,
    pub category_id: CategoryId,
    pub tracking_code: String,
    pub payer: Payer,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trip_status: Option<TripStatus>,
}

impl Parcel {
    /// Creates a parcel with a generated id and no trip status.
    pub fn new(category_id: CategoryId, tracking_code: impl Into<String>, payer: Payer) -> Self {
        Self {
            id: Uuid::now_v7(),
            category_id,
            tracking_code: tracking_code.into(),
            payer,
            created_at: crate::db::now_epoch_ms(),
            trip_status: None,
        }
    }
}
