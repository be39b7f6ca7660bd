use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::AppJson;
use crate::auth::{Caller, Role};
use crate::error::AppError;
use crate::models::ride::{Ride, RideStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(assign_ride).get(list_rides))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/complete", post(complete_ride))
        .route("/rides/:id/status", patch(update_ride_status))
}

#[derive(Deserialize)]
pub struct AssignRideRequest {
    pub booking_id: Uuid,
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateRideStatusRequest {
    pub status: RideStatus,
}

async fn assign_ride(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<AssignRideRequest>,
) -> Result<Json<Ride>, AppError> {
    caller.require_admin()?;
    let ride = state
        .assignment
        .assign_ride(payload.booking_id, payload.driver_id)
        .await?;
    Ok(Json(ride))
}

async fn list_rides(
    caller: Caller,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Ride>>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.rides.list()))
}

async fn get_ride(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    // Refused before the lookup: a client learns nothing about ride ids.
    if caller.role == Role::Client {
        return Err(AppError::Forbidden("admin or driver role required".to_string()));
    }

    let ride = state.rides.get(id)?;
    match caller.role {
        Role::Admin => Ok(Json(ride)),
        _ if caller.id == ride.driver_id => Ok(Json(ride)),
        _ => Err(AppError::Forbidden(format!("ride {id} is not yours"))),
    }
}

async fn complete_ride(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.rides.complete_ride(id).await?))
}

async fn update_ride_status(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateRideStatusRequest>,
) -> Result<Json<Ride>, AppError> {
    let driver_id = caller.require_driver()?;
    let ride = state
        .rides
        .update_ride_status(id, driver_id, payload.status)
        .await?;
    Ok(Json(ride))
}
