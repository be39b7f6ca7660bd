use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::AppJson;
use crate::auth::Caller;
use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(onboard_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/rides", get(driver_rides))
}

#[derive(Deserialize)]
pub struct OnboardDriverRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub vehicle: Option<String>,
    pub rating: f64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

async fn onboard_driver(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<OnboardDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    caller.require_admin()?;

    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("name cannot be empty".to_string()));
    }

    if !payload.email.contains('@') {
        return Err(AppError::InvalidArgument("email is not valid".to_string()));
    }

    let driver = state.drivers.onboard(Driver::onboard(
        payload.name,
        payload.email,
        payload.phone,
        payload.vehicle,
        payload.rating,
    ));
    tracing::info!(driver_id = %driver.id, "driver onboarded");

    Ok(Json(driver))
}

async fn list_drivers(
    caller: Caller,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Driver>>, AppError> {
    caller.require_admin()?;
    Ok(Json(state.drivers.list()))
}

async fn get_driver(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    caller.require_admin_or_driver(id)?;
    Ok(Json(state.drivers.get(id)?))
}

async fn update_driver_status(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    caller.require_admin_or_driver(id)?;
    Ok(Json(state.admin.update_driver_status(id, payload.status).await?))
}

async fn driver_rides(
    caller: Caller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Ride>>, AppError> {
    caller.require_admin_or_driver(id)?;
    Ok(Json(state.rides.driver_rides(id)))
}
