use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CapturePaypalOrderRequest, CreatePaypalOrderRequest, OrderList, OrderRequest,
        OrderWithItems, PaypalOrderCreated, ReviewRequest, ReviewSummary,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/review", post(review))
        .route("/paypal", post(create_paypal_order))
        .route("/paypal/capture", post(capture_paypal_order))
        .route("/{id}", get(get_order))
        .route("/{id}/cancel", post(cancel_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status")
    ),
    responses(
        (status = 200, description = "List the current user's orders", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let response = checkout_service::list_orders(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders/review",
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Price the requested items without committing anything", body = ApiResponse<ReviewSummary>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewSummary>>> {
    let response = checkout_service::review(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Place an order with frozen prices", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "An item is not available"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = checkout_service::order(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = checkout_service::get_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Cancel an order and release its stock", body = ApiResponse<Order>),
        (status = 409, description = "Order already shipped or completed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let response = checkout_service::cancel_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders/paypal",
    request_body = CreatePaypalOrderRequest,
    responses(
        (status = 200, description = "Create the gateway order; funds do not move yet", body = ApiResponse<PaypalOrderCreated>),
        (status = 502, description = "Payment provider unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_paypal_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaypalOrderRequest>,
) -> AppResult<Json<ApiResponse<PaypalOrderCreated>>> {
    let response = checkout_service::create_paypal_order(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/orders/paypal/capture",
    request_body = CapturePaypalOrderRequest,
    responses(
        (status = 200, description = "Capture the gateway order; idempotent under retries", body = ApiResponse<OrderWithItems>),
        (status = 502, description = "Capture failed or outcome unknown"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn capture_paypal_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CapturePaypalOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = checkout_service::capture_paypal_order(&state, &user, payload).await?;
    Ok(Json(response))
}
