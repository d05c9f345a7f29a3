//! Fleet inventory handlers

use crate::{
    api::{
        error::{ApiError, Result},
        types::UploadQuery,
    },
    domain::{
        types::VehicleId,
        vehicles::{NewVehicle, Vehicle, VehicleUpdate},
        views::{self, FleetSnapshot, TypeAvailability, VehicleDetails, VehicleFilter},
    },
    server::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(filter): Query<VehicleFilter>,
) -> Result<Json<Vec<Vehicle>>> {
    let vehicles = state.vehicles.list().await?;
    let filtered = views::filter_vehicles(&vehicles, &filter)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(filtered))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    Json(input): Json<NewVehicle>,
) -> Result<(StatusCode, Json<Vehicle>)> {
    let vehicle = state.vehicles.create(input).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn create_vehicles_bulk(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<NewVehicle>>,
) -> Result<(StatusCode, Json<Vec<Vehicle>>)> {
    let vehicles = state.vehicles.create_many(inputs).await?;
    Ok((StatusCode::CREATED, Json(vehicles)))
}

pub async fn vehicle_availability(
    State(state): State<AppState>,
) -> Result<Json<Vec<TypeAvailability>>> {
    let vehicles = state.vehicles.list().await?;
    Ok(Json(views::availability_by_type(&vehicles)))
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<VehicleId>,
) -> Result<Json<VehicleDetails>> {
    let snapshot = FleetSnapshot::load(&state.repositories).await?;
    Ok(Json(views::vehicle_details(&snapshot, &vehicle_id)?))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<VehicleId>,
    Json(update): Json<VehicleUpdate>,
) -> Result<Json<Vehicle>> {
    Ok(Json(state.vehicles.update(&vehicle_id, update).await?))
}

pub async fn delete_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<VehicleId>,
) -> Result<StatusCode> {
    state.vehicles.delete(&vehicle_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Raw image bytes in the body; `?file_name=` names the upload
pub async fn upload_vehicle_image(
    State(state): State<AppState>,
    Path(vehicle_id): Path<VehicleId>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<Vehicle>> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Image body is empty"));
    }
    let vehicle = state
        .vehicles
        .attach_image(&vehicle_id, &query.file_name, &body)
        .await?;
    info!(vehicle_id = %vehicle.id, size = body.len(), "Stored vehicle image");
    Ok(Json(vehicle))
}
