//! Cart orchestration: availability checks, atomic store mutations, price
//! enrichment. Every mutating operation returns the freshly enriched cart,
//! never a stale write result.

use crate::{
    audit::log_audit,
    availability::{self, ItemRequest},
    dto::cart::{CartItemInput, LineItemKeyInput, UpdateQuantityRequest, UpdateVariantRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartLineItem},
    response::{ApiResponse, Meta},
    services::catalog_service,
    state::AppState,
    store::cart_store::{self, LineItemKey, NewLineItem},
};

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: CartItemInput,
    currency: &str,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let request = ItemRequest {
        product_id: payload.product_id,
        variant_id: payload.variant_id,
        quantity: payload.quantity,
    };
    let checked = availability::check_available(&state.pool, &[request]).await?;
    if !availability::all_available(&checked) {
        return Err(AppError::Unavailable("Product not available".to_string()));
    }

    let item = NewLineItem {
        product_id: payload.product_id,
        variant_id: payload.variant_id,
        quantity: payload.quantity,
    };

    match cart_store::fetch(&state.pool, user.user_id).await? {
        None => {
            cart_store::create_or_attach(&state.pool, user.user_id, item).await?;
        }
        Some(cart) => {
            if let Some(existing) = cart.find_item(payload.product_id, payload.variant_id) {
                // Re-validate for the combined quantity before stacking onto
                // the existing line item.
                let combined = ItemRequest {
                    quantity: existing.quantity + payload.quantity,
                    ..request
                };
                let checked = availability::check_available(&state.pool, &[combined]).await?;
                if !availability::all_available(&checked) {
                    return Err(AppError::Unavailable(
                        "The quantity you selected has reached the maximum capacity for this product"
                            .to_string(),
                    ));
                }

                let updated = cart_store::increment_quantity(
                    &state.pool,
                    user.user_id,
                    payload.product_id,
                    payload.variant_id,
                    payload.quantity,
                    1,
                )
                .await?;
                if updated == 0 {
                    return Err(AppError::Conflict(
                        "Cart was modified concurrently, retry".to_string(),
                    ));
                }
            } else {
                cart_store::add_line_item(&state.pool, user.user_id, item).await?;
            }
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "variant_id": payload.variant_id,
            "quantity": payload.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    get_cart(state, user, currency).await
}

/// Apply `add_to_cart` per item, strictly in input order: each step sees the
/// cart state produced by the previous one. The response is the cart after
/// the last item.
pub async fn add_products_to_cart(
    state: &AppState,
    user: &AuthUser,
    items: Vec<CartItemInput>,
    currency: &str,
) -> AppResult<ApiResponse<Cart>> {
    let mut items = items.into_iter();
    let Some(first) = items.next() else {
        return Err(AppError::BadRequest("No products to add".to_string()));
    };

    let mut response = add_to_cart(state, user, first, currency).await?;
    for item in items {
        response = add_to_cart(state, user, item, currency).await?;
    }
    Ok(response)
}

pub async fn update_product_quantity_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateQuantityRequest,
    currency: &str,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }

    // Quantity zero means removal, never a stored zero-quantity line item.
    if payload.quantity == 0 {
        return delete_from_cart(
            state,
            user,
            vec![LineItemKeyInput {
                product_id: payload.product_id,
                variant_id: payload.variant_id,
            }],
            currency,
        )
        .await;
    }

    let request = ItemRequest {
        product_id: payload.product_id,
        variant_id: payload.variant_id,
        quantity: payload.quantity,
    };

    let Some(cart) = cart_store::fetch(&state.pool, user.user_id).await? else {
        // No cart yet: validate and create one holding the target quantity.
        let checked = availability::check_available(&state.pool, &[request]).await?;
        if !availability::all_available(&checked) {
            return Err(AppError::Unavailable("Product not available".to_string()));
        }
        cart_store::create_or_attach(
            &state.pool,
            user.user_id,
            NewLineItem {
                product_id: payload.product_id,
                variant_id: payload.variant_id,
                quantity: payload.quantity,
            },
        )
        .await?;
        return get_cart(state, user, currency).await;
    };

    let Some(existing) = cart.find_item(payload.product_id, payload.variant_id) else {
        return Err(AppError::NotFound(
            "No products found in cart".to_string(),
        ));
    };

    // Optimistic-concurrency guard: the client priced its update against
    // `old_quantity`; if the stored value moved on, the update is stale.
    if existing.quantity != payload.old_quantity {
        return Err(AppError::Conflict(
            "Invalid old quantity, cart has changed since it was loaded".to_string(),
        ));
    }

    let checked = availability::check_available(&state.pool, &[request]).await?;
    if !availability::all_available(&checked) {
        return Err(AppError::Unavailable("Product not available".to_string()));
    }

    let delta = payload.quantity - payload.old_quantity;
    if delta != 0 {
        let updated = cart_store::increment_quantity(
            &state.pool,
            user.user_id,
            payload.product_id,
            payload.variant_id,
            delta,
            1,
        )
        .await?;
        if updated == 0 {
            return Err(AppError::Conflict(
                "Cart was modified concurrently, retry".to_string(),
            ));
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_update_quantity",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "variant_id": payload.variant_id,
            "quantity": payload.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    get_cart(state, user, currency).await
}

pub async fn update_variant_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateVariantRequest,
    currency: &str,
) -> AppResult<ApiResponse<Cart>> {
    let Some(cart) = cart_store::fetch(&state.pool, user.user_id).await? else {
        return Err(AppError::NotFound("Cart not found".to_string()));
    };

    let Some(moved) = cart.find_item(payload.product_id, payload.old_variant_id) else {
        return Err(AppError::NotFound(
            "No products found in cart".to_string(),
        ));
    };

    if let Some(target) = cart.find_item(payload.product_id, payload.variant_id) {
        // The new pair already exists: merge the moved quantity into it and
        // drop the old line item, collapsing two lines into one.
        let merge = UpdateQuantityRequest {
            product_id: payload.product_id,
            variant_id: payload.variant_id,
            quantity: moved.quantity + target.quantity,
            old_quantity: target.quantity,
        };
        update_product_quantity_to_cart(state, user, merge, currency).await?;

        cart_store::remove_line_items(
            &state.pool,
            user.user_id,
            &[LineItemKey {
                product_id: payload.product_id,
                variant_id: payload.old_variant_id,
            }],
        )
        .await?;
    } else {
        let request = ItemRequest {
            product_id: payload.product_id,
            variant_id: payload.variant_id,
            quantity: moved.quantity,
        };
        let checked = availability::check_available(&state.pool, &[request]).await?;
        if !availability::all_available(&checked) {
            return Err(AppError::Unavailable("Product not available".to_string()));
        }

        let updated = cart_store::set_variant(
            &state.pool,
            user.user_id,
            payload.product_id,
            payload.old_variant_id,
            payload.variant_id,
        )
        .await?;
        if updated == 0 {
            return Err(AppError::Conflict(
                "Cart was modified concurrently, retry".to_string(),
            ));
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_update_variant",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "old_variant_id": payload.old_variant_id,
            "variant_id": payload.variant_id,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    get_cart(state, user, currency).await
}

pub async fn delete_from_cart(
    state: &AppState,
    user: &AuthUser,
    items: Vec<LineItemKeyInput>,
    currency: &str,
) -> AppResult<ApiResponse<Cart>> {
    let keys: Vec<LineItemKey> = items
        .iter()
        .map(|item| LineItemKey {
            product_id: item.product_id,
            variant_id: item.variant_id,
        })
        .collect();

    cart_store::remove_line_items(&state.pool, user.user_id, &keys).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "removed": keys.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    get_cart(state, user, currency).await
}

/// Load the cart and attach live pricing to every line item. Items come back
/// most-recently-added first (reverse of storage order).
pub async fn get_cart(
    state: &AppState,
    user: &AuthUser,
    currency: &str,
) -> AppResult<ApiResponse<Cart>> {
    let Some(cart) = cart_store::fetch(&state.pool, user.user_id).await? else {
        return Err(AppError::NotFound("Cart not found".to_string()));
    };

    let mut items = Vec::with_capacity(cart.items.len());
    for stored in &cart.items {
        let product =
            catalog_service::get_priced(&state.orm, stored.product_id, currency).await?;
        items.push(CartLineItem {
            product,
            variant_id: stored.variant_id,
            quantity: stored.quantity,
        });
    }
    items.reverse();

    let data = Cart {
        user_id: cart.user_id,
        item_count: cart.item_count,
        items,
    };
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}
