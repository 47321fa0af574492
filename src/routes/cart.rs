use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post, put},
};

use crate::{
    dto::cart::{
        AddProductsToCartRequest, CartItemInput, RemoveFromCartRequest, UpdateQuantityRequest,
        UpdateVariantRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Cart,
    response::ApiResponse,
    routes::params::CurrencyQuery,
    services::{cart_service, catalog_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_cart)
                .post(add_to_cart)
                .delete(remove_from_cart),
        )
        .route("/batch", post(add_products_to_cart))
        .route("/quantity", put(update_quantity))
        .route("/variant", put(update_variant))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "Cart with live pricing, latest activity first", body = ApiResponse<Cart>),
        (status = 404, description = "Cart not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CurrencyQuery>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let currency = catalog_service::normalize_currency(query.currency);
    let response = cart_service::get_cart(&state, &user, &currency).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = CartItemInput,
    params(
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "Add a product to the cart", body = ApiResponse<Cart>),
        (status = 400, description = "Product not available"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CurrencyQuery>,
    Json(payload): Json<CartItemInput>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let currency = catalog_service::normalize_currency(query.currency);
    let response = cart_service::add_to_cart(&state, &user, payload, &currency).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/cart/batch",
    request_body = AddProductsToCartRequest,
    params(
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "Add several products sequentially; returns the cart after the last one", body = ApiResponse<Cart>),
        (status = 400, description = "A product was not available"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_products_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CurrencyQuery>,
    Json(payload): Json<AddProductsToCartRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let currency = catalog_service::normalize_currency(query.currency);
    let response =
        cart_service::add_products_to_cart(&state, &user, payload.products, &currency).await?;
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/api/cart/quantity",
    request_body = UpdateQuantityRequest,
    params(
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "Set a line item's quantity", body = ApiResponse<Cart>),
        (status = 409, description = "Stale old_quantity"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CurrencyQuery>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let currency = catalog_service::normalize_currency(query.currency);
    let response =
        cart_service::update_product_quantity_to_cart(&state, &user, payload, &currency).await?;
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/api/cart/variant",
    request_body = UpdateVariantRequest,
    params(
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "Switch a line item to another variant, merging when the target exists", body = ApiResponse<Cart>),
        (status = 404, description = "Cart or line item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CurrencyQuery>,
    Json(payload): Json<UpdateVariantRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let currency = catalog_service::normalize_currency(query.currency);
    let response = cart_service::update_variant_to_cart(&state, &user, payload, &currency).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    request_body = RemoveFromCartRequest,
    params(
        ("currency" = Option<String>, Query, description = "Display currency, default USD")
    ),
    responses(
        (status = 200, description = "Remove a batch of line items; returns the (possibly empty) cart", body = ApiResponse<Cart>),
        (status = 404, description = "Cart not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CurrencyQuery>,
    Json(payload): Json<RemoveFromCartRequest>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let currency = catalog_service::normalize_currency(query.currency);
    let response = cart_service::delete_from_cart(&state, &user, payload.products, &currency).await?;
    Ok(Json(response))
}
