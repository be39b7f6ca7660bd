use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::bookings::BookingLifecycle;
use crate::engine::drivers::DriverAvailability;
use crate::engine::locks::LockKey;
use crate::engine::{Coordination, Rollback};
use crate::error::AppError;
use crate::models::booking::{BookingPatch, BookingStatus};
use crate::models::driver::DriverStatus;
use crate::models::ride::{Ride, RideEventKind};

/// Binds an unassigned booking to an available driver.
#[derive(Clone)]
pub struct RideAssignment {
    ctx: Coordination,
    bookings: BookingLifecycle,
    drivers: DriverAvailability,
}

impl RideAssignment {
    pub fn new(ctx: Coordination) -> Self {
        Self {
            bookings: BookingLifecycle::new(ctx.store.clone()),
            drivers: DriverAvailability::new(ctx.store.clone()),
            ctx,
        }
    }

    /// Creates the ride, marks the driver busy and the booking assigned,
    /// all under one lock on the (booking, driver) pair.
    pub async fn assign_ride(&self, booking_id: Uuid, driver_id: Uuid) -> Result<Ride, AppError> {
        self.ctx
            .measured("assign_ride", self.assign_locked(booking_id, driver_id))
            .await
            .inspect_err(|err| {
                warn!(
                    booking_id = %booking_id,
                    driver_id = %driver_id,
                    error = %err,
                    "ride assignment rejected"
                );
            })
    }

    async fn assign_locked(&self, booking_id: Uuid, driver_id: Uuid) -> Result<Ride, AppError> {
        let _guard = self
            .ctx
            .locks
            .acquire([LockKey::Booking(booking_id), LockKey::Driver(driver_id)])
            .await;

        let driver = self.drivers.get(driver_id)?;
        if driver.status == DriverStatus::Busy
            || self.ctx.store.active_ride_for_driver(driver_id).is_some()
        {
            return Err(AppError::DriverUnavailable(driver_id));
        }

        let booking = self.bookings.get(booking_id)?;
        match booking.status {
            BookingStatus::Unassigned => {}
            BookingStatus::Assigned | BookingStatus::Completed => {
                return Err(AppError::BookingAlreadyAssigned(booking_id));
            }
            BookingStatus::Cancelled => {
                return Err(AppError::Conflict(format!(
                    "booking {booking_id} is cancelled"
                )));
            }
        }
        if self.ctx.store.active_ride_for_booking(booking_id).is_some() {
            return Err(AppError::BookingAlreadyAssigned(booking_id));
        }

        let ride = Ride::assign(booking_id, driver_id);

        let ride = Rollback::default().guard(&self.ctx.store, |undo| {
            undo.created_ride(ride.id);
            self.ctx.store.rides.put(ride.clone());

            undo.driver(&driver);
            self.drivers.set_status(driver_id, DriverStatus::Busy)?;

            undo.booking(&booking);
            self.bookings
                .patch(booking_id, BookingPatch::status(BookingStatus::Assigned))?;

            Ok(ride)
        })?;

        self.ctx.refresh_busy_gauge();
        self.ctx.publish(RideEventKind::Assigned, &ride);

        info!(
            ride_id = %ride.id,
            booking_id = %booking_id,
            driver_id = %driver_id,
            "ride assigned"
        );

        Ok(ride)
    }
}
