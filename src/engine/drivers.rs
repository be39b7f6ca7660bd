//! Driver availability.
//!
//! Status writes here are unconditional; the ride coordinators decide when
//! a driver may be flipped to busy or released.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};
use crate::store::EntityStore;

#[derive(Clone)]
pub struct DriverAvailability {
    store: Arc<EntityStore>,
}

impl DriverAvailability {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    pub fn onboard(&self, driver: Driver) -> Driver {
        self.store.drivers.put(driver.clone());
        driver
    }

    pub fn get(&self, driver_id: Uuid) -> Result<Driver, AppError> {
        self.store
            .drivers
            .get(&driver_id)
            .ok_or(AppError::DriverNotFound(driver_id))
    }

    pub fn list(&self) -> Vec<Driver> {
        let mut drivers = self.store.drivers.list();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));
        drivers
    }

    pub fn set_status(&self, driver_id: Uuid, status: DriverStatus) -> Result<Driver, AppError> {
        self.store
            .drivers
            .update(&driver_id, |driver| {
                driver.status = status;
                driver.updated_at = Utc::now();
            })
            .ok_or(AppError::DriverNotFound(driver_id))
    }

    pub fn increment_total_rides(&self, driver_id: Uuid) -> Result<Driver, AppError> {
        self.store
            .drivers
            .update(&driver_id, |driver| {
                driver.total_rides = driver.total_rides.saturating_add(1);
                driver.updated_at = Utc::now();
            })
            .ok_or(AppError::DriverNotFound(driver_id))
    }
}
