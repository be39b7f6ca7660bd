use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Available,
    Busy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    pub status: DriverStatus,
    pub total_rides: u32,
    pub rating: f64,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn onboard(
        name: String,
        email: String,
        phone: String,
        vehicle: Option<String>,
        rating: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            phone,
            vehicle,
            status: DriverStatus::Available,
            total_rides: 0,
            rating: rating.clamp(0.0, 5.0),
            updated_at: Utc::now(),
        }
    }
}
