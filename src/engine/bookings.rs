//! Booking lifecycle.
//!
//! `patch` merges whatever it is given, status included. Legal status
//! movement is enforced by the ride coordinators and [`super::admin`].

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingPatch, BookingStatus, NewBooking};
use crate::store::EntityStore;

#[derive(Clone)]
pub struct BookingLifecycle {
    store: Arc<EntityStore>,
}

impl BookingLifecycle {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, payload: NewBooking) -> Booking {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            pickup: payload.pickup,
            dropoff: payload.dropoff,
            schedule: payload.schedule,
            passengers: payload.passengers,
            vehicle_class: payload.vehicle_class,
            contact: payload.contact,
            notes: payload.notes,
            status: BookingStatus::Unassigned,
            created_at: now,
            updated_at: now,
        };

        self.store.bookings.put(booking.clone());
        booking
    }

    pub fn get(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.store
            .bookings
            .get(&booking_id)
            .ok_or(AppError::BookingNotFound(booking_id))
    }

    pub fn list(&self) -> Vec<Booking> {
        let mut bookings = self.store.bookings.list();
        bookings.sort_by_key(|booking| booking.created_at);
        bookings
    }

    pub fn patch(&self, booking_id: Uuid, patch: BookingPatch) -> Result<Booking, AppError> {
        self.store
            .bookings
            .update(&booking_id, |booking| {
                patch.apply(booking);
                booking.updated_at = Utc::now();
            })
            .ok_or(AppError::BookingNotFound(booking_id))
    }

    pub fn delete(&self, booking_id: Uuid) -> bool {
        self.store.bookings.delete(&booking_id)
    }
}
