use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::api::rest::extract::AppJson;
use crate::auth::Caller;
use crate::error::AppError;
use crate::models::booking::{Booking, BookingPatch, NewBooking};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route(
            "/bookings/:id",
            get(get_booking).patch(edit_booking).delete(remove_booking),
        )
        .route("/bookings/:id/cancel", post(cancel_booking))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Public intake endpoint behind the booking form.
async fn create_booking(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewBooking>,
) -> Result<Json<Booking>, AppError> {
    if payload.pickup.address.trim().is_empty() || payload.dropoff.address.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "pickup and dropoff addresses are required".to_string(),
        ));
    }

    if payload.passengers == 0 {
        return Err(AppError::InvalidArgument("passengers must be > 0".to_string()));
    }

    if payload.contact.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("contact name cannot be empty".to_string()));
    }

    let booking = state.bookings.create(payload);
    tracing::info!(booking_id = %booking.id, "booking received");

    Ok(Json(booking))
}

async fn list_bookings(
    caller: Caller,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Booking>>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.bookings.list()))
}

async fn get_booking(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.bookings.get(id)?))
}

async fn edit_booking(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AppJson(patch): AppJson<BookingPatch>,
) -> Result<Json<Booking>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.admin.edit_booking(id, patch).await?))
}

async fn remove_booking(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, AppError> {
    caller.require_admin()?;
    let deleted = state.admin.remove_booking(id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn cancel_booking(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.admin.cancel_booking(id).await?))
}
