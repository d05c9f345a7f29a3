//! Checkout, return and rental record handlers

use crate::{
    api::{
        error::{ApiError, Result},
        types::{
            CheckoutBody, CheckoutResponse, CompleteBody, ExtendBody, QuickCheckoutBody,
            QuickCheckoutResponse, SearchQuery,
        },
    },
    domain::{
        billing,
        lifecycle::{CheckoutRequest, CompletionReceipt},
        rentals::{validate_planned_duration, Rental},
        types::{Money, RentalId, VehicleId},
        views::{self, CustomerRentalGroup, FleetSnapshot, RentalDetails},
    },
    server::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

/// Email the administrator once per customer in the receipt. Failures are
/// logged; the rentals are already completed.
pub(crate) async fn notify_completion(state: &AppState, receipt: &CompletionReceipt) {
    for (customer_id, lines) in receipt.by_customer() {
        let customer = match state.repositories.customers.get_customer(&customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                warn!(customer_id = %customer_id, "Customer missing, skipping completion email");
                continue;
            }
            Err(e) => {
                warn!(customer_id = %customer_id, error = %e, "Failed to load customer for completion email");
                continue;
            }
        };

        if let Err(e) = state
            .notifier
            .rental_completed(&customer, &lines, receipt.completed_at)
            .await
        {
            warn!(customer_id = %customer_id, error = %e, "Failed to send completion email");
        }
    }
}

async fn estimate_for(state: &AppState, vehicle_ids: &[VehicleId], planned: i64) -> Result<Money> {
    let vehicles = state.vehicles.list().await?;
    let selected = vehicles.iter().filter(|v| vehicle_ids.contains(&v.id));
    Ok(billing::estimate_cost(selected, planned)?)
}

pub async fn checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let request = CheckoutRequest {
        customer_id: body.customer_id,
        vehicle_ids: body.vehicle_ids,
        start_time: body.start_time.unwrap_or_else(|| state.clock.now()),
        planned_duration: body.planned_duration,
        force: body.force,
    };
    let planned = request.planned_duration;

    let rentals = state.lifecycle.checkout(request).await?;
    let vehicle_ids: Vec<VehicleId> = rentals.iter().map(|r| r.vehicle_id).collect();
    let estimated_cost = estimate_for(&state, &vehicle_ids, planned).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            rentals,
            estimated_cost,
        }),
    ))
}

pub async fn quick_checkout(
    State(state): State<AppState>,
    Json(body): Json<QuickCheckoutBody>,
) -> Result<(StatusCode, Json<QuickCheckoutResponse>)> {
    let now = state.clock.now();
    let planned = body
        .planned_duration
        .unwrap_or(state.config.billing.default_planned_duration_minutes);
    validate_planned_duration(planned)?;

    let wanted: Vec<_> = body
        .vehicles
        .iter()
        .map(|item| (item.vehicle_type, item.count))
        .collect();
    let fleet = state.vehicles.list().await?;
    let vehicle_ids = views::select_vehicles_for_quick_checkout(&fleet, &wanted, body.force)?;

    let name = body.customer_name.filter(|n| !n.trim().is_empty());
    let phone = body.phone.filter(|p| !p.trim().is_empty());
    let customer = match (name, phone) {
        (Some(name), Some(phone)) => state.customers.find_or_register(&name, &phone).await?,
        (name, None) => state.customers.register_walk_in(name, now).await?,
        (None, Some(_)) => {
            return Err(ApiError::bad_request("A phone number needs a customer name"));
        }
    };

    let rentals = state
        .lifecycle
        .checkout(CheckoutRequest {
            customer_id: customer.id,
            vehicle_ids: vehicle_ids.clone(),
            start_time: now,
            planned_duration: planned,
            force: body.force,
        })
        .await?;

    let selected = fleet.iter().filter(|v| vehicle_ids.contains(&v.id));
    let estimated_cost = billing::estimate_cost(selected, planned).map_err(ApiError::from)?;

    info!(
        customer_id = %customer.id,
        vehicles = rentals.len(),
        "Quick checkout"
    );
    Ok((
        StatusCode::CREATED,
        Json(QuickCheckoutResponse {
            customer,
            rentals,
            estimated_cost,
        }),
    ))
}

pub async fn list_active(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CustomerRentalGroup>>> {
    let snapshot = FleetSnapshot::load(&state.repositories).await?;
    let groups = views::active_rentals_by_customer(
        &snapshot,
        state.clock.now(),
        state.config.billing.overdue_grace_minutes,
        query.q.as_deref(),
    )?;
    Ok(Json(groups))
}

pub async fn list_overdue(
    State(state): State<AppState>,
) -> Result<Json<Vec<CustomerRentalGroup>>> {
    let snapshot = FleetSnapshot::load(&state.repositories).await?;
    let groups = views::overdue_rentals_by_customer(
        &snapshot,
        state.clock.now(),
        state.config.billing.overdue_grace_minutes,
    )?;
    Ok(Json(groups))
}

pub async fn complete(
    State(state): State<AppState>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<CompletionReceipt>> {
    let receipt = state
        .lifecycle
        .complete(&body.rental_ids, state.clock.now())
        .await?;
    notify_completion(&state, &receipt).await;
    Ok(Json(receipt))
}

pub async fn preview_completion(
    State(state): State<AppState>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<CompletionReceipt>> {
    let receipt = state
        .lifecycle
        .preview_completion(&body.rental_ids, state.clock.now())
        .await?;
    Ok(Json(receipt))
}

pub async fn get_rental(
    State(state): State<AppState>,
    Path(rental_id): Path<RentalId>,
) -> Result<Json<RentalDetails>> {
    let snapshot = FleetSnapshot::load(&state.repositories).await?;
    let details = views::rental_details(
        &snapshot,
        &rental_id,
        state.clock.now(),
        state.config.billing.overdue_grace_minutes,
    )?;
    Ok(Json(details))
}

pub async fn delete_rental(
    State(state): State<AppState>,
    Path(rental_id): Path<RentalId>,
) -> Result<StatusCode> {
    state.lifecycle.delete_rental_record(&rental_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn extend_rental(
    State(state): State<AppState>,
    Path(rental_id): Path<RentalId>,
    Json(body): Json<ExtendBody>,
) -> Result<Json<Rental>> {
    let rental = state
        .lifecycle
        .extend(&rental_id, body.additional_minutes)
        .await?;
    Ok(Json(rental))
}
