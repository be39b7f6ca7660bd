pub mod admin;
pub mod assignment;
pub mod bookings;
pub mod drivers;
pub mod locks;
pub mod rides;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::engine::locks::LockTable;
use crate::error::AppError;
use crate::models::booking::Booking;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::ride::{Ride, RideEvent, RideEventKind};
use crate::observability::metrics::Metrics;
use crate::store::EntityStore;

/// Shared handles every coordinator needs. Cheap to clone.
#[derive(Clone)]
pub struct Coordination {
    pub store: Arc<EntityStore>,
    pub locks: Arc<LockTable>,
    pub events: broadcast::Sender<RideEvent>,
    pub metrics: Metrics,
}

impl Coordination {
    pub fn new(store: Arc<EntityStore>, event_buffer_size: usize) -> Self {
        let (events, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        Self {
            store,
            locks: Arc::new(LockTable::new()),
            events,
            metrics: Metrics::new(),
        }
    }

    pub(crate) async fn measured<T, F>(&self, operation: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.metrics
            .observe(operation, result.is_ok(), start.elapsed().as_secs_f64());
        result
    }

    pub(crate) fn publish(&self, kind: RideEventKind, ride: &Ride) {
        // No subscribers is fine.
        let _ = self.events.send(RideEvent::new(kind, ride));
    }

    pub(crate) fn refresh_busy_gauge(&self) {
        let busy = self
            .store
            .drivers
            .find(|driver| driver.status == DriverStatus::Busy)
            .len();
        self.metrics.drivers_busy.set(busy as i64);
    }
}

/// Pre-images of records written inside one critical section.
///
/// If any write of a multi-record commit fails, `restore` puts every
/// touched record back so no partial update outlives the section.
#[derive(Default)]
pub(crate) struct Rollback {
    bookings: Vec<Booking>,
    drivers: Vec<Driver>,
    rides: Vec<Ride>,
    created_rides: Vec<Uuid>,
}

impl Rollback {
    pub(crate) fn booking(&mut self, booking: &Booking) {
        self.bookings.push(booking.clone());
    }

    pub(crate) fn driver(&mut self, driver: &Driver) {
        self.drivers.push(driver.clone());
    }

    pub(crate) fn ride(&mut self, ride: &Ride) {
        self.rides.push(ride.clone());
    }

    pub(crate) fn created_ride(&mut self, id: Uuid) {
        self.created_rides.push(id);
    }

    pub(crate) fn restore(self, store: &EntityStore) {
        for id in &self.created_rides {
            store.rides.delete(id);
        }
        for ride in self.rides {
            store.rides.put(ride);
        }
        for driver in self.drivers {
            store.drivers.put(driver);
        }
        for booking in self.bookings {
            store.bookings.put(booking);
        }
    }

    /// Runs `commit`; on error, undoes every recorded write and passes the error on.
    pub(crate) fn guard<T, F>(mut self, store: &EntityStore, commit: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Self) -> Result<T, AppError>,
    {
        match commit(&mut self) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::error!(error = %err, "commit failed; restoring pre-images");
                self.restore(store);
                Err(err)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::driver;

    #[test]
    fn failed_commit_restores_pre_images() {
        let store = EntityStore::new();
        let d = driver("Jonas");
        store.drivers.put(d.clone());

        let result: Result<(), AppError> = Rollback::default().guard(&store, |undo| {
            undo.driver(&d);
            store.drivers.update(&d.id, |d| d.status = DriverStatus::Busy);
            let ride = Ride::assign(Uuid::new_v4(), d.id);
            undo.created_ride(ride.id);
            store.rides.put(ride);
            Err(AppError::Internal("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.drivers.get(&d.id).unwrap().status, DriverStatus::Available);
        assert!(store.rides.is_empty());
    }
}
