use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Business,
    FirstClass,
    Van,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Unassigned,
    Assigned,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub pickup: Location,
    pub dropoff: Location,
    pub schedule: Schedule,
    pub passengers: u8,
    pub vehicle_class: VehicleClass,
    pub contact: Contact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Intake payload; validated by the booking form before it reaches the lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub pickup: Location,
    pub dropoff: Location,
    pub schedule: Schedule,
    pub passengers: u8,
    pub vehicle_class: VehicleClass,
    pub contact: Contact,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingPatch {
    #[serde(default)]
    pub pickup: Option<Location>,
    #[serde(default)]
    pub dropoff: Option<Location>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub passengers: Option<u8>,
    #[serde(default)]
    pub vehicle_class: Option<VehicleClass>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(self, booking: &mut Booking) {
        if let Some(pickup) = self.pickup {
            booking.pickup = pickup;
        }
        if let Some(dropoff) = self.dropoff {
            booking.dropoff = dropoff;
        }
        if let Some(schedule) = self.schedule {
            booking.schedule = schedule;
        }
        if let Some(passengers) = self.passengers {
            booking.passengers = passengers;
        }
        if let Some(vehicle_class) = self.vehicle_class {
            booking.vehicle_class = vehicle_class;
        }
        if let Some(contact) = self.contact {
            booking.contact = contact;
        }
        if let Some(notes) = self.notes {
            booking.notes = Some(notes);
        }
        if let Some(status) = self.status {
            booking.status = status;
        }
    }
}
