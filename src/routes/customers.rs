use axum::{
    extract::{Query, State},
    Json,
};
use bytes::Bytes;
use data_model::{Customer, TableEntity};
use tracing::info;

use super::RouteState;
use crate::http_objects::{parse_entity, ApiError, CustomerCreated, SearchParams};

/// Add a customer
#[utoipa::path(
    post,
    path = "/AddCustomers",
    request_body(content_type = "application/json", content = inline(serde_json::Value)),
    tag = "customers",
    responses(
        (status = 200, description = "Customer added", body = CustomerCreated),
        (status = 400, description = "empty or invalid customer"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn add_customer(
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<Json<CustomerCreated>, ApiError> {
    let mut customer: Customer = parse_entity(&body, "Invalid customer data")?;
    customer.assign_new_keys();

    state
        .customers
        .create_if_not_exists()
        .await
        .map_err(ApiError::internal_error)?;
    state
        .customers
        .add_entity(&customer)
        .await
        .map_err(ApiError::internal_error)?;

    info!(
        "Added new customer: {} {}",
        customer.first_name, customer.last_name
    );

    Ok(Json(CustomerCreated {
        message: "Customer added successfully".to_string(),
        customer_id: customer.row_key().to_string(),
    }))
}

/// List all customers
#[utoipa::path(
    get,
    path = "/GetCustomers",
    tag = "customers",
    responses(
        (status = 200, description = "All customers"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
pub async fn get_customers(State(state): State<RouteState>) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = state
        .customers
        .query::<Customer>()
        .await
        .map_err(ApiError::internal_error)?;
    Ok(Json(customers))
}

/// Search customers by first name, last name or email
#[utoipa::path(
    get,
    path = "/SearchCustomers",
    tag = "customers",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching customers"),
        (status = 400, description = "searchTerm missing"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn search_customers(
    State(state): State<RouteState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let search_term = params
        .search_term
        .filter(|term| !term.is_empty())
        .ok_or_else(|| ApiError::bad_request("searchTerm parameter is required"))?;

    let customers = state
        .customers
        .query::<Customer>()
        .await
        .map_err(ApiError::internal_error)?
        .into_iter()
        .filter(|customer| customer.matches_search_term(&search_term))
        .collect();
    Ok(Json(customers))
}
