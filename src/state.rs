use std::sync::Arc;

use tokio::sync::broadcast;

use crate::auth::IdentityProvider;
use crate::engine::Coordination;
use crate::engine::admin::Administration;
use crate::engine::assignment::RideAssignment;
use crate::engine::bookings::BookingLifecycle;
use crate::engine::drivers::DriverAvailability;
use crate::engine::rides::RideProgress;
use crate::models::driver::Driver;
use crate::models::ride::RideEvent;
use crate::observability::metrics::Metrics;
use crate::store::EntityStore;

/// Built once in `main` and shared with every handler.
pub struct AppState {
    pub store: Arc<EntityStore>,
    pub bookings: BookingLifecycle,
    pub drivers: DriverAvailability,
    pub assignment: RideAssignment,
    pub rides: RideProgress,
    pub admin: Administration,
    pub ride_events_tx: broadcast::Sender<RideEvent>,
    pub metrics: Metrics,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(event_buffer_size: usize, identity: Arc<dyn IdentityProvider>) -> Self {
        let store = Arc::new(EntityStore::new());
        let ctx = Coordination::new(store.clone(), event_buffer_size);

        Self {
            bookings: BookingLifecycle::new(store.clone()),
            drivers: DriverAvailability::new(store.clone()),
            assignment: RideAssignment::new(ctx.clone()),
            rides: RideProgress::new(ctx.clone()),
            admin: Administration::new(ctx.clone()),
            ride_events_tx: ctx.events.clone(),
            metrics: ctx.metrics.clone(),
            store,
            identity,
        }
    }

    /// Small demo fleet for local runs.
    pub fn seed_demo_drivers(&self) -> Vec<Driver> {
        [
            ("Marco Rossi", "marco@chauffeur.example", "Mercedes S-Class", 4.9),
            ("Sofia Lindqvist", "sofia@chauffeur.example", "BMW 7 Series", 4.8),
            ("Karim Haddad", "karim@chauffeur.example", "Mercedes V-Class", 4.7),
        ]
        .into_iter()
        .map(|(name, email, vehicle, rating)| {
            self.drivers.onboard(Driver::onboard(
                name.to_string(),
                email.to_string(),
                "+49300000000".to_string(),
                Some(vehicle.to_string()),
                rating,
            ))
        })
        .collect()
    }
}
