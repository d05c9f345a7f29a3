//! Customer registry handlers

use crate::{
    api::{
        error::{ApiError, Result},
        routes::rentals::notify_completion,
        types::{DeleteCustomerQuery, SearchQuery, UploadQuery},
    },
    domain::{
        customers::{Customer, CustomerAttachment, CustomerUpdate, NewCustomer},
        lifecycle::CompletionReceipt,
        types::CustomerId,
        views::{self, CustomerHistory, FleetSnapshot},
    },
    server::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Customer>>> {
    let customers = match query.q.as_deref() {
        Some(q) => state.customers.search(q).await?,
        None => state.customers.list().await?,
    };
    Ok(Json(customers))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(input): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>)> {
    let customer = state.customers.register(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<Json<Customer>> {
    Ok(Json(state.customers.get(&customer_id).await?))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Json(update): Json<CustomerUpdate>,
) -> Result<Json<Customer>> {
    Ok(Json(state.customers.update(&customer_id, update).await?))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Query(query): Query<DeleteCustomerQuery>,
) -> Result<StatusCode> {
    state
        .customers
        .delete(&customer_id, query.purge_history)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn customer_history(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<Json<CustomerHistory>> {
    let snapshot = FleetSnapshot::load(&state.repositories).await?;
    Ok(Json(views::customer_history(&snapshot, &customer_id)?))
}

async fn upload_attachment(
    state: &AppState,
    customer_id: &CustomerId,
    attachment: CustomerAttachment,
    file_name: &str,
    body: &Bytes,
) -> Result<Customer> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Upload body is empty"));
    }
    Ok(state
        .customers
        .attach(customer_id, attachment, file_name, body)
        .await?)
}

pub async fn upload_document(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<Customer>> {
    let customer = upload_attachment(
        &state,
        &customer_id,
        CustomerAttachment::Document,
        &query.file_name,
        &body,
    )
    .await?;
    Ok(Json(customer))
}

pub async fn upload_signature(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<Customer>> {
    let customer = upload_attachment(
        &state,
        &customer_id,
        CustomerAttachment::Signature,
        &query.file_name,
        &body,
    )
    .await?;
    Ok(Json(customer))
}

/// Return every vehicle the customer currently holds
pub async fn complete_customer_rentals(
    State(state): State<AppState>,
    Path(customer_id): Path<CustomerId>,
) -> Result<Json<CompletionReceipt>> {
    let now = state.clock.now();
    let receipt = state.lifecycle.complete_customer(&customer_id, now).await?;
    notify_completion(&state, &receipt).await;
    Ok(Json(receipt))
}
