use axum::{extract::State, Json};
use bytes::Bytes;
use data_model::{Order, Product, TableEntity};
use tracing::info;

use super::RouteState;
use crate::http_objects::{parse_entity, ApiError, OrderCreated, ProductCreated};

/// Add an order and publish it to the order queue
#[utoipa::path(
    post,
    path = "/AddOrders",
    request_body(content_type = "application/json", content = inline(serde_json::Value)),
    tag = "orders",
    responses(
        (status = 200, description = "Order added", body = OrderCreated),
        (status = 400, description = "empty or invalid order"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn add_order(
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<Json<OrderCreated>, ApiError> {
    let mut order: Order = parse_entity(&body, "Invalid order data")?;
    order.assign_new_keys();

    state
        .orders
        .create_if_not_exists()
        .await
        .map_err(ApiError::internal_error)?;
    state
        .orders
        .add_entity(&order)
        .await
        .map_err(ApiError::internal_error)?;
    state
        .order_queue
        .send_json(&order)
        .await
        .map_err(ApiError::internal_error)?;

    info!(
        order_id = order.row_key(),
        queue = state.order_queue.name(),
        "Added new order: {} x {} for {}", order.quantity, order.product_name, order.first_name
    );

    Ok(Json(OrderCreated {
        message: "Order added successfully".to_string(),
        order_id: order.row_key().to_string(),
    }))
}

/// List all orders
#[utoipa::path(
    get,
    path = "/GetOrders",
    tag = "orders",
    responses(
        (status = 200, description = "All orders"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
pub async fn get_orders(State(state): State<RouteState>) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state
        .orders
        .query::<Order>()
        .await
        .map_err(ApiError::internal_error)?;
    Ok(Json(orders))
}

/// Add a product
#[utoipa::path(
    post,
    path = "/AddProducts",
    request_body(content_type = "application/json", content = inline(serde_json::Value)),
    tag = "products",
    responses(
        (status = 200, description = "Product added", body = ProductCreated),
        (status = 400, description = "empty or invalid product"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn add_product(
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<Json<ProductCreated>, ApiError> {
    let mut product: Product = parse_entity(&body, "Invalid product data")?;
    product.assign_new_keys();

    state
        .products
        .create_if_not_exists()
        .await
        .map_err(ApiError::internal_error)?;
    state
        .products
        .add_entity(&product)
        .await
        .map_err(ApiError::internal_error)?;

    info!("Added new product: {}", product.product_name);

    Ok(Json(ProductCreated {
        message: "Product added successfully".to_string(),
        product_id: product.row_key().to_string(),
    }))
}

/// List all products
#[utoipa::path(
    get,
    path = "/GetProducts",
    tag = "products",
    responses(
        (status = 200, description = "All products"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
pub async fn get_products(
    State(state): State<RouteState>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .products
        .query::<Product>()
        .await
        .map_err(ApiError::internal_error)?;
    Ok(Json(products))
}
