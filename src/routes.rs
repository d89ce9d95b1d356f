use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
};

use crate::handlers::{
    admin, auth, cart, catalog, inventory, order, payment, prescription, stats, stock_request,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Login, signup and the public directory listings.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(auth::signup))
        .route("/api/login", post(auth::login))
        .route("/api/doctors", get(catalog::list_doctors))
        .route("/api/pharmacists", get(catalog::list_pharmacists))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(catalog::list_medicines).post(catalog::create_medicine),
        )
        .route(
            "/medicines",
            get(catalog::list_medicines).post(catalog::create_medicine),
        )
        .route(
            "/api/medicines",
            get(catalog::list_medicines).post(catalog::create_medicine),
        )
        .route("/api/medicines/available", get(catalog::list_available_medicines))
        .route("/api/pharmacist/medicines", get(catalog::list_medicines))
        .route("/api/pharmacist/user/:id", get(catalog::get_pharmacist_by_user))
        .route("/api/doctor/:id/patients", get(catalog::list_doctor_patients))
        .route("/suppliers", get(catalog::list_suppliers))
        .route("/api/suppliers", get(catalog::list_suppliers))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart", post(cart::add_to_cart))
        // `:id` is the user for GET and the cart line for PUT/DELETE.
        .route(
            "/api/cart/:id",
            get(cart::get_cart)
                .put(cart::update_cart_item)
                .delete(cart::remove_cart_item),
        )
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/orders",
            get(order::list_all_orders).post(order::place_order),
        )
        .route("/api/orders/:id", get(order::list_user_orders))
        .route("/api/orders/:id/status", put(order::update_order_status))
        .route(
            "/api/payments",
            get(payment::list_all_payments).post(payment::pay_order),
        )
        .route("/api/payments/:id", get(payment::list_user_payments))
}

pub fn prescription_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/prescriptions",
            get(prescription::list_prescriptions).post(prescription::upload_prescription),
        )
        // GET lists a patient's prescriptions; PUT/DELETE act on one prescription.
        .route(
            "/api/prescriptions/:id",
            get(prescription::list_patient_prescriptions)
                .put(prescription::update_prescription)
                .delete(prescription::delete_prescription),
        )
        .route(
            "/api/prescriptions/:id/verify",
            put(prescription::verify_prescription),
        )
        .route(
            "/api/patient/:id/prescriptions",
            get(prescription::list_patient_prescriptions),
        )
        .route(
            "/api/patient/:id/eligible-orders",
            get(prescription::list_eligible_orders),
        )
        .route("/api/doctor/prescriptions", get(prescription::list_prescriptions))
        .route("/api/doctor/:id/stats", get(stats::doctor_stats))
        .route(
            "/api/doctor/:id/prescriptions",
            get(prescription::list_doctor_prescriptions),
        )
        .route(
            "/api/doctor/pending-prescriptions/:id",
            get(prescription::list_pending_for_doctor),
        )
        .route(
            "/api/doctor/verify-prescription/:id",
            put(prescription::verify_prescription),
        )
}

pub fn stock_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/stock-requests",
            get(stock_request::list_stock_requests).post(stock_request::create_stock_request),
        )
        .route("/api/stock-requests/:id", get(stock_request::get_stock_request))
        .route(
            "/api/stock-requests/:id/accept",
            put(stock_request::accept_stock_request),
        )
        .route(
            "/api/stock-requests/:id/reject",
            put(stock_request::reject_stock_request),
        )
        .route(
            "/api/stock-requests/:id/ship",
            put(stock_request::ship_stock_request),
        )
        .route(
            "/api/stock-requests/:id/deliver",
            put(stock_request::deliver_stock_request),
        )
        .route(
            "/api/stock-requests/:id/complete",
            put(stock_request::deliver_stock_request),
        )
        .route(
            "/api/pharmacist/:id/stock-requests",
            get(stock_request::list_pharmacist_requests),
        )
        .route("/api/pharmacist/:id/stats", get(stats::pharmacist_stats))
        .route("/api/pharmacist/add-to-inventory", post(inventory::add_to_inventory))
}

pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/api/supplier/user/:id", get(inventory::get_supplier_by_user))
        .route(
            "/api/supplier/:id",
            get(inventory::get_supplier).put(inventory::update_supplier),
        )
        .route(
            "/api/supplier/:id/inventory",
            get(inventory::list_inventory).post(inventory::add_inventory_item),
        )
        .route(
            "/api/supplier/:id/inventory/:inventory_id",
            put(inventory::update_inventory_item).delete(inventory::delete_inventory_item),
        )
        .route(
            "/api/supplier/:id/stock-requests",
            get(stock_request::list_supplier_requests),
        )
        .route("/api/supplier/:id/stats", get(stats::supplier_stats))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/users",
            get(admin::list_users).post(admin::add_user),
        )
        .route(
            "/api/admin/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/api/admin/stats", get(stats::admin_stats))
        .route("/api/admin/reports", get(admin::report))
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(auth::SESSION_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Logs `METHOD path -> status (elapsed ms)` for every request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    let elapsed = start.elapsed().as_millis();
    let status = response.status();

    if status.is_server_error() {
        log::error!("{} {} -> {} ({} ms)", method, path, status.as_u16(), elapsed);
    } else {
        log::info!("{} {} -> {} ({} ms)", method, path, status.as_u16(), elapsed);
    }
    response
}

/// Builds the full application router.
pub fn create_app(state: AppState, cors_origins: &[String], images_dir: &str) -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(order_routes())
        .merge(prescription_routes())
        .merge(stock_request_routes())
        .merge(supplier_routes())
        .merge(admin_routes())
        .nest_service("/images", ServeDir::new(images_dir))
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}
