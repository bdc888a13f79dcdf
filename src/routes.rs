use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request},
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
    Router,
};
use blob_store::{BlobStorage, FileShare, ShareDirectory};
use chrono::Utc;
use table_store::TableClient;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;

use crate::{
    http_objects::{
        ApiError,
        CustomerCreated,
        FileUploaded,
        HealthStatus,
        OrderCreated,
        ProductCreated,
    },
    queue::Queue,
};

mod blobs;
mod catalog;
mod customers;
mod files;

#[derive(OpenApi)]
#[openapi(
        paths(
            index,
            customers::add_customer,
            customers::get_customers,
            customers::search_customers,
            catalog::add_order,
            catalog::get_orders,
            catalog::add_product,
            catalog::get_products,
            files::upload_file,
            files::list_files,
            blobs::upload_blob,
            blobs::list_blobs,
        ),
        components(
            schemas(
                ApiError,
                HealthStatus,
                CustomerCreated,
                OrderCreated,
                ProductCreated,
                FileUploaded,
            )
        ),
        tags(
            (name = "retail", description = "Retail storage API")
        )
    )]
struct ApiDoc;

/// Storage handles shared by every handler. Built once at startup.
#[derive(Clone)]
pub struct RouteState {
    pub customers: Arc<TableClient>,
    pub orders: Arc<TableClient>,
    pub products: Arc<TableClient>,
    pub file_share: Arc<FileShare>,
    pub share_directory: Arc<ShareDirectory>,
    pub blob_storage: Arc<BlobStorage>,
    pub order_queue: Arc<Queue>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/docs/openapi.json", get(openapi_json))
        .route("/AddCustomers", post(customers::add_customer))
        .route("/GetCustomers", get(customers::get_customers))
        .route("/SearchCustomers", get(customers::search_customers))
        .route("/AddOrders", post(catalog::add_order))
        .route("/GetOrders", get(catalog::get_orders))
        .route("/AddProducts", post(catalog::add_product))
        .route("/GetProducts", get(catalog::get_products))
        .route("/files/upload", post(files::upload_file))
        .route("/files/list", get(files::list_files))
        .route("/api/UploadBlob", post(blobs::upload_blob))
        .route("/api/ListBlobs", get(blobs::list_blobs))
        .with_state(route_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(DefaultBodyLimit::max(usize::MAX))
}

const ENDPOINTS: &[&str] = &[
    "GET    / - Health check (this page)",
    "POST   /AddCustomers - Add a new customer",
    "GET    /GetCustomers - Get all customers",
    "GET    /SearchCustomers?searchTerm=name - Search customers",
    "POST   /AddOrders - Add a new order",
    "GET    /GetOrders - Get all orders",
    "POST   /AddProducts - Add a new product",
    "GET    /GetProducts - Get all products",
    "POST   /files/upload - Upload a file to the file share",
    "GET    /files/list - List uploaded files",
    "POST   /api/UploadBlob - Upload a blob",
    "GET    /api/ListBlobs - List uploaded blobs",
];

/// Health check
#[utoipa::path(
    get,
    path = "/",
    tag = "retail",
    responses(
        (status = 200, description = "Service is running", body = HealthStatus),
    ),
)]
async fn index() -> Result<impl IntoResponse, ApiError> {
    info!("Health check endpoint called");
    let status = HealthStatus {
        message: "Retail storage API is running!".to_string(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        timestamp: Utc::now(),
    };
    let body = serde_json::to_string_pretty(&status)
        .map_err(|e| ApiError::internal_error(e.into()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::internal_error_str(&details).into_response()
}
