//! Admin-side booking edits and manual driver status.
//!
//! These share the aggregate locks with the ride coordinators so an edit can
//! never interleave with an assignment or completion of the same booking.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::bookings::BookingLifecycle;
use crate::engine::drivers::DriverAvailability;
use crate::engine::locks::{AggregateGuard, LockKey};
use crate::engine::{Coordination, Rollback};
use crate::error::AppError;
use crate::models::booking::{Booking, BookingPatch, BookingStatus};
use crate::models::driver::{Driver, DriverStatus};
use crate::models::ride::{Ride, RideEventKind, RideStatus};

const MAX_LOCK_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct Administration {
    ctx: Coordination,
    bookings: BookingLifecycle,
    drivers: DriverAvailability,
}

impl Administration {
    pub fn new(ctx: Coordination) -> Self {
        Self {
            bookings: BookingLifecycle::new(ctx.store.clone()),
            drivers: DriverAvailability::new(ctx.store.clone()),
            ctx,
        }
    }

    /// Manual availability override. Unconditional, but serialized with
    /// assignments touching the same driver.
    pub async fn update_driver_status(
        &self,
        driver_id: Uuid,
        status: DriverStatus,
    ) -> Result<Driver, AppError> {
        self.ctx
            .measured("update_driver_status", async {
                let _guard = self.ctx.locks.acquire([LockKey::Driver(driver_id)]).await;
                self.drivers.set_status(driver_id, status)
            })
            .await
            .inspect(|driver| {
                self.ctx.refresh_busy_gauge();
                info!(driver_id = %driver.id, status = ?driver.status, "driver status updated");
            })
    }

    /// Cancels the booking and, if it has a live ride, cancels that ride and
    /// frees the driver without counting the ride. Cancelling twice is a no-op.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.ctx
            .measured("cancel_booking", self.cancel_with_lock(booking_id))
            .await
            .inspect_err(|err| {
                warn!(booking_id = %booking_id, error = %err, "booking cancellation rejected");
            })
    }

    async fn cancel_with_lock(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let (_guard, active) = self.lock_booking(booking_id).await?;
        let booking = self.bookings.get(booking_id)?;
        self.cancel_locked(booking, active)
    }

    pub async fn edit_booking(
        &self,
        booking_id: Uuid,
        patch: BookingPatch,
    ) -> Result<Booking, AppError> {
        self.ctx
            .measured("edit_booking", self.edit_with_lock(booking_id, patch))
            .await
            .inspect_err(|err| {
                warn!(booking_id = %booking_id, error = %err, "booking edit rejected");
            })
    }

    async fn edit_with_lock(
        &self,
        booking_id: Uuid,
        mut patch: BookingPatch,
    ) -> Result<Booking, AppError> {
        let (_guard, active) = self.lock_booking(booking_id).await?;
        let booking = self.bookings.get(booking_id)?;

        match patch.status.take() {
            None => {}
            Some(BookingStatus::Cancelled) => {
                self.cancel_locked(booking, active)?;
            }
            Some(BookingStatus::Unassigned) => {
                if active.is_some() || booking.status == BookingStatus::Completed {
                    return Err(AppError::Conflict(format!(
                        "booking {booking_id} cannot be reopened from {:?}",
                        booking.status
                    )));
                }
                patch.status = Some(BookingStatus::Unassigned);
            }
            Some(other) => {
                return Err(AppError::InvalidArgument(format!(
                    "status {other:?} is set by ride operations, not by booking edits"
                )));
            }
        }

        let updated = self.bookings.patch(booking_id, patch)?;
        info!(booking_id = %booking_id, status = ?updated.status, "booking edited");
        Ok(updated)
    }

    /// Deletes a booking no ride has ever referenced. Returns whether it
    /// existed.
    pub async fn remove_booking(&self, booking_id: Uuid) -> Result<bool, AppError> {
        self.ctx
            .measured("remove_booking", self.remove_with_lock(booking_id))
            .await
            .inspect_err(|err| {
                warn!(booking_id = %booking_id, error = %err, "booking removal rejected");
            })
    }

    async fn remove_with_lock(&self, booking_id: Uuid) -> Result<bool, AppError> {
        let (_guard, _active) = self.lock_booking(booking_id).await?;

        // Ride history keeps pointing at its booking, finished or not.
        let rides = self.ctx.store.rides.find(|ride| ride.booking_id == booking_id);
        if let Some(ride) = rides.first() {
            return Err(AppError::Conflict(format!(
                "booking {booking_id} is referenced by ride {} ({:?})",
                ride.id, ride.status
            )));
        }

        let existed = self.bookings.delete(booking_id);
        info!(booking_id = %booking_id, existed, "booking removed");
        Ok(existed)
    }

    /// Locks the booking plus the driver of its live ride, if any.
    ///
    /// The live ride is read before locking, so it is re-read afterwards and
    /// the lock is retried when the driver it names is not covered.
    async fn lock_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<(AggregateGuard, Option<Ride>), AppError> {
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let seen = self.ctx.store.active_ride_for_booking(booking_id);

            let mut keys = vec![LockKey::Booking(booking_id)];
            if let Some(ride) = &seen {
                keys.push(LockKey::Driver(ride.driver_id));
            }
            let guard = self.ctx.locks.acquire(keys).await;

            let active = self.ctx.store.active_ride_for_booking(booking_id);
            let covered = active
                .as_ref()
                .is_none_or(|ride| guard.covers(LockKey::Driver(ride.driver_id)));
            if covered {
                return Ok((guard, active));
            }
        }

        Err(AppError::Conflict(format!(
            "booking {booking_id} is changing too quickly to lock"
        )))
    }

    fn cancel_locked(&self, booking: Booking, active: Option<Ride>) -> Result<Booking, AppError> {
        match booking.status {
            BookingStatus::Cancelled => return Ok(booking),
            BookingStatus::Completed => {
                return Err(AppError::Conflict(format!(
                    "booking {} is already completed",
                    booking.id
                )));
            }
            BookingStatus::Unassigned | BookingStatus::Assigned => {}
        }

        let driver = match &active {
            Some(ride) => Some(self.drivers.get(ride.driver_id)?),
            None => None,
        };

        let (cancelled, cancelled_ride) = Rollback::default().guard(&self.ctx.store, |undo| {
            let cancelled_ride = match (&active, &driver) {
                (Some(ride), Some(driver)) => {
                    let mut cancelled_ride = ride.clone();
                    cancelled_ride.status = RideStatus::Cancelled;
                    cancelled_ride.cancelled_at = Some(Utc::now());

                    undo.ride(ride);
                    self.ctx.store.rides.put(cancelled_ride.clone());

                    undo.driver(driver);
                    self.drivers.set_status(driver.id, DriverStatus::Available)?;
                    Some(cancelled_ride)
                }
                _ => None,
            };

            undo.booking(&booking);
            let cancelled = self
                .bookings
                .patch(booking.id, BookingPatch::status(BookingStatus::Cancelled))?;

            Ok((cancelled, cancelled_ride))
        })?;

        if let Some(ride) = &cancelled_ride {
            self.ctx.refresh_busy_gauge();
            self.ctx.publish(RideEventKind::Cancelled, ride);
        }

        info!(
            booking_id = %cancelled.id,
            ride_id = ?cancelled_ride.as_ref().map(|ride| ride.id),
            "booking cancelled"
        );

        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::assignment::RideAssignment;
    use crate::engine::fixtures::{driver, new_booking};
    use crate::engine::rides::RideProgress;
    use crate::models::booking::VehicleClass;
    use crate::store::EntityStore;

    struct Harness {
        ctx: Coordination,
        admin: Administration,
        assignment: RideAssignment,
        progress: RideProgress,
        bookings: BookingLifecycle,
        drivers: DriverAvailability,
    }

    fn harness() -> Harness {
        let ctx = Coordination::new(Arc::new(EntityStore::new()), 16);
        Harness {
            admin: Administration::new(ctx.clone()),
            assignment: RideAssignment::new(ctx.clone()),
            progress: RideProgress::new(ctx.clone()),
            bookings: BookingLifecycle::new(ctx.store.clone()),
            drivers: DriverAvailability::new(ctx.store.clone()),
            ctx,
        }
    }

    #[tokio::test]
    async fn cancelling_assigned_booking_releases_driver_without_counting() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let b = h.bookings.create(new_booking("Potsdamer Platz"));
        let ride = h.assignment.assign_ride(b.id, d.id).await.unwrap();

        let cancelled = h.admin.cancel_booking(b.id).await.unwrap();

        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        let ride = h.progress.get(ride.id).unwrap();
        assert_eq!(ride.status, RideStatus::Cancelled);
        assert!(ride.cancelled_at.is_some());
        let d = h.drivers.get(d.id).unwrap();
        assert_eq!(d.status, DriverStatus::Available);
        assert_eq!(d.total_rides, 0);
        assert_eq!(h.ctx.metrics.drivers_busy.get(), 0);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let h = harness();
        let b = h.bookings.create(new_booking("Potsdamer Platz"));

        h.admin.cancel_booking(b.id).await.unwrap();
        let again = h.admin.cancel_booking(b.id).await.unwrap();
        assert_eq!(again.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn completed_booking_cannot_be_cancelled() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let b = h.bookings.create(new_booking("Potsdamer Platz"));
        let ride = h.assignment.assign_ride(b.id, d.id).await.unwrap();
        h.progress.complete_ride(ride.id).await.unwrap();

        let err = h.admin.cancel_booking(b.id).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn cancelled_ride_cannot_be_completed() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let b = h.bookings.create(new_booking("Potsdamer Platz"));
        let ride = h.assignment.assign_ride(b.id, d.id).await.unwrap();
        h.admin.cancel_booking(b.id).await.unwrap();

        let err = h.progress.complete_ride(ride.id).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        assert_eq!(h.drivers.get(d.id).unwrap().total_rides, 0);
    }

    #[tokio::test]
    async fn edit_merges_fields_and_routes_cancellation() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let b = h.bookings.create(new_booking("Potsdamer Platz"));
        h.assignment.assign_ride(b.id, d.id).await.unwrap();

        let edited = h
            .admin
            .edit_booking(
                b.id,
                BookingPatch {
                    vehicle_class: Some(VehicleClass::FirstClass),
                    status: Some(BookingStatus::Cancelled),
                    ..BookingPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.status, BookingStatus::Cancelled);
        assert_eq!(edited.vehicle_class, VehicleClass::FirstClass);
        assert_eq!(h.drivers.get(d.id).unwrap().status, DriverStatus::Available);
    }

    #[tokio::test]
    async fn edit_rejects_lifecycle_owned_statuses() {
        let h = harness();
        let b = h.bookings.create(new_booking("Potsdamer Platz"));

        for status in [BookingStatus::Assigned, BookingStatus::Completed] {
            let err = h
                .admin
                .edit_booking(b.id, BookingPatch::status(status))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "invalid_argument");
        }
        assert_eq!(h.bookings.get(b.id).unwrap().status, BookingStatus::Unassigned);
    }

    #[tokio::test]
    async fn reopening_requires_no_live_ride() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let b = h.bookings.create(new_booking("Potsdamer Platz"));
        h.assignment.assign_ride(b.id, d.id).await.unwrap();

        let err = h
            .admin
            .edit_booking(b.id, BookingPatch::status(BookingStatus::Unassigned))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");

        h.admin.cancel_booking(b.id).await.unwrap();
        let reopened = h
            .admin
            .edit_booking(b.id, BookingPatch::status(BookingStatus::Unassigned))
            .await
            .unwrap();
        assert_eq!(reopened.status, BookingStatus::Unassigned);
    }

    #[tokio::test]
    async fn remove_refuses_booking_with_live_ride() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let b = h.bookings.create(new_booking("Potsdamer Platz"));
        let lone = h.bookings.create(new_booking("Tiergarten"));
        h.assignment.assign_ride(b.id, d.id).await.unwrap();

        let err = h.admin.remove_booking(b.id).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");

        assert!(h.admin.remove_booking(lone.id).await.unwrap());
        assert!(!h.admin.remove_booking(lone.id).await.unwrap());
    }

    #[tokio::test]
    async fn remove_refuses_booking_with_finished_ride() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let done = h.bookings.create(new_booking("Potsdamer Platz"));
        let dropped = h.bookings.create(new_booking("Tiergarten"));

        let ride = h.assignment.assign_ride(done.id, d.id).await.unwrap();
        h.progress.complete_ride(ride.id).await.unwrap();
        h.assignment.assign_ride(dropped.id, d.id).await.unwrap();
        h.admin.cancel_booking(dropped.id).await.unwrap();

        for id in [done.id, dropped.id] {
            let err = h.admin.remove_booking(id).await.unwrap_err();
            assert_eq!(err.kind(), "conflict");
            assert!(h.bookings.get(id).is_ok());
        }
        assert!(h
            .ctx
            .store
            .rides
            .list()
            .iter()
            .all(|ride| h.bookings.get(ride.booking_id).is_ok()));
    }

    #[tokio::test]
    async fn rejected_edits_and_removals_are_counted() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));
        let b = h.bookings.create(new_booking("Potsdamer Platz"));
        h.assignment.assign_ride(b.id, d.id).await.unwrap();

        h.admin
            .edit_booking(b.id, BookingPatch::status(BookingStatus::Completed))
            .await
            .unwrap_err();
        h.admin.remove_booking(b.id).await.unwrap_err();
        h.admin
            .edit_booking(b.id, BookingPatch::default())
            .await
            .unwrap();

        let ops = &h.ctx.metrics.coordinator_operations_total;
        assert_eq!(ops.with_label_values(&["edit_booking", "error"]).get(), 1);
        assert_eq!(ops.with_label_values(&["edit_booking", "success"]).get(), 1);
        assert_eq!(ops.with_label_values(&["remove_booking", "error"]).get(), 1);
    }

    #[tokio::test]
    async fn manual_status_update_is_unconditional() {
        let h = harness();
        let d = h.drivers.onboard(driver("Ines"));

        let busy = h
            .admin
            .update_driver_status(d.id, DriverStatus::Busy)
            .await
            .unwrap();
        assert_eq!(busy.status, DriverStatus::Busy);
        assert_eq!(h.ctx.metrics.drivers_busy.get(), 1);

        let missing = Uuid::new_v4();
        let err = h
            .admin
            .update_driver_status(missing, DriverStatus::Available)
            .await
            .unwrap_err();
        assert_eq!(err, AppError::DriverNotFound(missing));
    }
}
