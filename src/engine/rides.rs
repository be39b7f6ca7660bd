use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::bookings::BookingLifecycle;
use crate::engine::drivers::DriverAvailability;
use crate::engine::locks::{AggregateGuard, LockKey};
use crate::engine::{Coordination, Rollback};
use crate::error::AppError;
use crate::models::booking::{BookingPatch, BookingStatus};
use crate::models::driver::DriverStatus;
use crate::models::ride::{Ride, RideEventKind, RideStatus};

/// Moves rides forward and releases their drivers on completion.
#[derive(Clone)]
pub struct RideProgress {
    ctx: Coordination,
    bookings: BookingLifecycle,
    drivers: DriverAvailability,
}

impl RideProgress {
    pub fn new(ctx: Coordination) -> Self {
        Self {
            bookings: BookingLifecycle::new(ctx.store.clone()),
            drivers: DriverAvailability::new(ctx.store.clone()),
            ctx,
        }
    }

    pub fn get(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        self.ctx
            .store
            .rides
            .get(&ride_id)
            .ok_or(AppError::RideNotFound(ride_id))
    }

    pub fn list(&self) -> Vec<Ride> {
        let mut rides = self.ctx.store.rides.list();
        rides.sort_by_key(|ride| ride.assigned_at);
        rides
    }

    /// Every ride ever assigned to `driver_id`, oldest first. Unknown drivers get an empty list.
    pub fn driver_rides(&self, driver_id: Uuid) -> Vec<Ride> {
        let mut rides = self
            .ctx
            .store
            .rides
            .find(|ride| ride.driver_id == driver_id);
        rides.sort_by_key(|ride| ride.assigned_at);
        rides
    }

    /// Admin completion. Accepts assigned or in-progress rides; a second
    /// call on the same ride fails with `RideAlreadyCompleted`.
    pub async fn complete_ride(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        self.ctx
            .measured("complete_ride", self.complete_locked(ride_id))
            .await
            .inspect_err(|err| warn!(ride_id = %ride_id, error = %err, "ride completion rejected"))
    }

    async fn complete_locked(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        let ride = self.get(ride_id)?;
        let _guard = self.lock_aggregate(&ride).await;

        let ride = self.get(ride_id)?;
        match ride.status {
            RideStatus::Assigned | RideStatus::InProgress => self.finish(ride),
            RideStatus::Completed => Err(AppError::RideAlreadyCompleted(ride_id)),
            RideStatus::Cancelled => Err(AppError::InvalidTransition(format!(
                "ride {ride_id} was cancelled"
            ))),
        }
    }

    /// Driver-initiated advance. Only the assigned driver may move the ride,
    /// and only one step at a time.
    pub async fn update_ride_status(
        &self,
        ride_id: Uuid,
        caller_driver_id: Uuid,
        status: RideStatus,
    ) -> Result<Ride, AppError> {
        self.ctx
            .measured(
                "update_ride_status",
                self.update_locked(ride_id, caller_driver_id, status),
            )
            .await
            .inspect_err(|err| {
                warn!(
                    ride_id = %ride_id,
                    driver_id = %caller_driver_id,
                    error = %err,
                    "ride status update rejected"
                );
            })
    }

    async fn update_locked(
        &self,
        ride_id: Uuid,
        caller_driver_id: Uuid,
        status: RideStatus,
    ) -> Result<Ride, AppError> {
        let ride = self.get(ride_id)?;
        if ride.driver_id != caller_driver_id {
            return Err(AppError::Forbidden(format!(
                "ride {ride_id} is not assigned to driver {caller_driver_id}"
            )));
        }
        if !matches!(status, RideStatus::InProgress | RideStatus::Completed) {
            return Err(AppError::InvalidArgument(format!(
                "status must be in_progress or completed, got {status:?}"
            )));
        }

        let _guard = self.lock_aggregate(&ride).await;
        let ride = self.get(ride_id)?;

        match (ride.status, status) {
            (RideStatus::Assigned, RideStatus::InProgress) => self.start(ride),
            (RideStatus::InProgress, RideStatus::Completed) => self.finish(ride),
            (RideStatus::Completed, _) => Err(AppError::RideAlreadyCompleted(ride_id)),
            (current, requested) => Err(AppError::InvalidTransition(format!(
                "ride {ride_id} cannot move from {current:?} to {requested:?}"
            ))),
        }
    }

    async fn lock_aggregate(&self, ride: &Ride) -> AggregateGuard {
        // booking_id and driver_id never change after assignment.
        self.ctx
            .locks
            .acquire([LockKey::Booking(ride.booking_id), LockKey::Driver(ride.driver_id)])
            .await
    }

    fn start(&self, mut ride: Ride) -> Result<Ride, AppError> {
        ride.status = RideStatus::InProgress;
        ride.started_at = Some(Utc::now());
        self.ctx.store.rides.put(ride.clone());

        self.ctx.publish(RideEventKind::Started, &ride);
        info!(ride_id = %ride.id, driver_id = %ride.driver_id, "ride started");
        Ok(ride)
    }

    /// Completes `ride`, frees its driver, counts the ride and closes the booking.
    /// Caller holds the aggregate lock.
    fn finish(&self, ride: Ride) -> Result<Ride, AppError> {
        let driver = self.drivers.get(ride.driver_id)?;
        let booking = self.bookings.get(ride.booking_id)?;

        let completed = Rollback::default().guard(&self.ctx.store, |undo| {
            let mut completed = ride.clone();
            completed.status = RideStatus::Completed;
            completed.completed_at = Some(Utc::now());

            undo.ride(&ride);
            self.ctx.store.rides.put(completed.clone());

            undo.driver(&driver);
            self.drivers.set_status(driver.id, DriverStatus::Available)?;
            self.drivers.increment_total_rides(driver.id)?;

            undo.booking(&booking);
            self.bookings
                .patch(booking.id, BookingPatch::status(BookingStatus::Completed))?;

            Ok(completed)
        })?;

        self.ctx.metrics.rides_completed_total.inc();
        self.ctx.refresh_busy_gauge();
        self.ctx.publish(RideEventKind::Completed, &completed);

        info!(
            ride_id = %completed.id,
            booking_id = %completed.booking_id,
            driver_id = %completed.driver_id,
            "ride completed"
        );

        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::assignment::RideAssignment;
    use crate::engine::fixtures::{driver, new_booking};
    use crate::store::EntityStore;

    struct Harness {
        ctx: Coordination,
        assignment: RideAssignment,
        progress: RideProgress,
        bookings: BookingLifecycle,
        drivers: DriverAvailability,
    }

    fn harness() -> Harness {
        let ctx = Coordination::new(Arc::new(EntityStore::new()), 16);
        Harness {
            assignment: RideAssignment::new(ctx.clone()),
            progress: RideProgress::new(ctx.clone()),
            bookings: BookingLifecycle::new(ctx.store.clone()),
            drivers: DriverAvailability::new(ctx.store.clone()),
            ctx,
        }
    }

    async fn assigned(h: &Harness) -> Ride {
        let d = h.drivers.onboard(driver("Nils"));
        let b = h.bookings.create(new_booking("Schloss Charlottenburg"));
        h.assignment.assign_ride(b.id, d.id).await.unwrap()
    }

    #[tokio::test]
    async fn assign_then_complete_round_trip() {
        let h = harness();
        let ride = assigned(&h).await;

        let done = h.progress.complete_ride(ride.id).await.unwrap();

        assert_eq!(done.status, RideStatus::Completed);
        assert!(done.completed_at.is_some());
        let d = h.drivers.get(ride.driver_id).unwrap();
        assert_eq!(d.status, DriverStatus::Available);
        assert_eq!(d.total_rides, 1);
        assert_eq!(
            h.bookings.get(ride.booking_id).unwrap().status,
            BookingStatus::Completed
        );
        assert_eq!(h.ctx.metrics.drivers_busy.get(), 0);
        assert_eq!(h.ctx.metrics.rides_completed_total.get(), 1);
    }

    #[tokio::test]
    async fn second_completion_fails_and_counts_once() {
        let h = harness();
        let ride = assigned(&h).await;

        h.progress.complete_ride(ride.id).await.unwrap();
        let err = h.progress.complete_ride(ride.id).await.unwrap_err();

        assert_eq!(err, AppError::RideAlreadyCompleted(ride.id));
        assert_eq!(h.drivers.get(ride.driver_id).unwrap().total_rides, 1);
    }

    #[tokio::test]
    async fn unknown_ride_is_not_found() {
        let h = harness();
        let id = Uuid::new_v4();
        assert_eq!(
            h.progress.complete_ride(id).await.unwrap_err(),
            AppError::RideNotFound(id)
        );
        assert_eq!(
            h.progress
                .update_ride_status(id, Uuid::new_v4(), RideStatus::InProgress)
                .await
                .unwrap_err(),
            AppError::RideNotFound(id)
        );
    }

    #[tokio::test]
    async fn driver_walks_ride_forward() {
        let h = harness();
        let ride = assigned(&h).await;

        let started = h
            .progress
            .update_ride_status(ride.id, ride.driver_id, RideStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(started.status, RideStatus::InProgress);
        assert!(started.started_at.is_some());
        assert_eq!(
            h.drivers.get(ride.driver_id).unwrap().status,
            DriverStatus::Busy
        );

        let done = h
            .progress
            .update_ride_status(ride.id, ride.driver_id, RideStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, RideStatus::Completed);
        assert_eq!(h.drivers.get(ride.driver_id).unwrap().total_rides, 1);
        assert_eq!(
            h.bookings.get(ride.booking_id).unwrap().status,
            BookingStatus::Completed
        );
    }

    #[tokio::test]
    async fn other_driver_is_forbidden_and_nothing_changes() {
        let h = harness();
        let ride = assigned(&h).await;
        let intruder = h.drivers.onboard(driver("Mallory"));

        for status in [RideStatus::InProgress, RideStatus::Completed, RideStatus::Assigned] {
            let err = h
                .progress
                .update_ride_status(ride.id, intruder.id, status)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "forbidden");
        }

        assert_eq!(h.progress.get(ride.id).unwrap().status, RideStatus::Assigned);
        assert_eq!(
            h.drivers.get(ride.driver_id).unwrap().status,
            DriverStatus::Busy
        );
        assert_eq!(h.drivers.get(intruder.id).unwrap().total_rides, 0);
    }

    #[tokio::test]
    async fn driver_cannot_skip_or_rewind() {
        let h = harness();
        let ride = assigned(&h).await;

        let err = h
            .progress
            .update_ride_status(ride.id, ride.driver_id, RideStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");

        let err = h
            .progress
            .update_ride_status(ride.id, ride.driver_id, RideStatus::Assigned)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");

        h.progress
            .update_ride_status(ride.id, ride.driver_id, RideStatus::InProgress)
            .await
            .unwrap();
        let err = h
            .progress
            .update_ride_status(ride.id, ride.driver_id, RideStatus::InProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[tokio::test]
    async fn completed_ride_rejects_driver_updates() {
        let h = harness();
        let ride = assigned(&h).await;
        h.progress.complete_ride(ride.id).await.unwrap();

        let err = h
            .progress
            .update_ride_status(ride.id, ride.driver_id, RideStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(err, AppError::RideAlreadyCompleted(ride.id));
        assert_eq!(h.drivers.get(ride.driver_id).unwrap().total_rides, 1);
    }

    #[tokio::test]
    async fn released_driver_can_take_the_next_booking() {
        let h = harness();
        let ride = assigned(&h).await;
        h.progress.complete_ride(ride.id).await.unwrap();

        let next = h.bookings.create(new_booking("Alexanderplatz"));
        let second = h.assignment.assign_ride(next.id, ride.driver_id).await.unwrap();

        let history = h.progress.driver_rides(ride.driver_id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, ride.id);
        assert_eq!(history[1].id, second.id);
    }

    #[tokio::test]
    async fn driver_rides_of_unknown_driver_is_empty() {
        let h = harness();
        assert!(h.progress.driver_rides(Uuid::new_v4()).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_completions_count_exactly_once() {
        let h = harness();
        let ride = assigned(&h).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let progress = h.progress.clone();
            let ride_id = ride.id;
            handles.push(tokio::spawn(async move { progress.complete_ride(ride_id).await }));
        }

        let results = futures::future::join_all(handles).await;
        let ok = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();

        assert_eq!(ok, 1);
        assert_eq!(h.drivers.get(ride.driver_id).unwrap().total_rides, 1);
    }
}
