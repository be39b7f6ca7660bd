use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Assigned and in-progress rides hold their driver.
    pub fn is_active(self) -> bool {
        matches!(self, RideStatus::Assigned | RideStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub driver_id: Uuid,
    pub status: RideStatus,
    pub assigned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Ride {
    pub fn assign(booking_id: Uuid, driver_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            driver_id,
            status: RideStatus::Assigned,
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideEventKind {
    Assigned,
    Started,
    Completed,
    Cancelled,
}

/// Published on the broadcast channel after each committed ride mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideEvent {
    pub kind: RideEventKind,
    pub ride: Ride,
    pub at: DateTime<Utc>,
}

impl RideEvent {
    pub fn new(kind: RideEventKind, ride: &Ride) -> Self {
        Self {
            kind,
            ride: ride.clone(),
            at: Utc::now(),
        }
    }
}
