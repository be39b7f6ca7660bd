//! In-memory entity store.
//!
//! One [`Table`] per record type, keyed by the record's UUID. Each map
//! operation is individually safe for concurrent callers; multi-record
//! consistency is the coordinators' job (see [`crate::engine::locks`]).

use dashmap::DashMap;
use uuid::Uuid;

use crate::models::booking::Booking;
use crate::models::driver::Driver;
use crate::models::ride::Ride;

pub trait Record: Clone {
    fn id(&self) -> Uuid;
}

impl Record for Booking {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Driver {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Ride {
    fn id(&self) -> Uuid {
        self.id
    }
}

pub struct Table<T: Record> {
    records: DashMap<Uuid, T>,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    /// Upsert.
    pub fn put(&self, record: T) {
        self.records.insert(record.id(), record);
    }

    /// Idempotent; reports whether a record existed.
    pub fn delete(&self, id: &Uuid) -> bool {
        self.records.remove(id).is_some()
    }

    /// Applies `f` in place and returns the updated copy, or `None` if absent.
    pub fn update<F>(&self, id: &Uuid, f: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        let mut entry = self.records.get_mut(id)?;
        f(entry.value_mut());
        Some(entry.value().clone())
    }

    pub fn list(&self) -> Vec<T> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn find<P>(&self, predicate: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        self.records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Default)]
pub struct EntityStore {
    pub bookings: Table<Booking>,
    pub drivers: Table<Driver>,
    pub rides: Table<Ride>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ride, if any, that currently holds `driver_id`.
    pub fn active_ride_for_driver(&self, driver_id: Uuid) -> Option<Ride> {
        self.rides
            .find(|ride| ride.driver_id == driver_id && ride.status.is_active())
            .into_iter()
            .next()
    }

    pub fn active_ride_for_booking(&self, booking_id: Uuid) -> Option<Ride> {
        self.rides
            .find(|ride| ride.booking_id == booking_id && ride.status.is_active())
            .into_iter()
            .next()
    }
}
