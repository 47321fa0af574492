use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::products::ProductList,
    error::AppResult,
    models::PricedProduct,
    response::ApiResponse,
    routes::params::{CurrencyQuery, ProductQuery},
    services::catalog_service,
    state::AppState,
};

// Read-only catalog surface: catalog CRUD belongs to another service; this
// one only prices what it sells.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search in title and description"),
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "List products with live pricing", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let response = catalog_service::list_products(&state, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<PricedProduct>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CurrencyQuery>,
) -> AppResult<Json<ApiResponse<PricedProduct>>> {
    let response = catalog_service::get_product(&state, id, query.currency).await?;
    Ok(Json(response))
}
