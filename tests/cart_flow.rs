mod common;

use std::sync::Arc;

use axum_storefront_api::{
    dto::cart::{CartItemInput, LineItemKeyInput, UpdateQuantityRequest, UpdateVariantRequest},
    error::AppError,
    models::Cart,
    services::cart_service,
};
use common::{auth_user, seed_product, setup_state, FakeGateway};
use serial_test::serial;
use uuid::Uuid;

fn item(product_id: Uuid, variant_id: Uuid, quantity: i32) -> CartItemInput {
    CartItemInput {
        product_id,
        variant_id,
        quantity,
    }
}

fn assert_count_invariant(cart: &Cart) {
    assert_eq!(
        cart.item_count as usize,
        cart.items.len(),
        "item_count must always equal the number of line items"
    );
}

// Full cart lifecycle: add, merge, optimistic-concurrency conflict, variant
// switch and merge, batch removal.
#[tokio::test]
#[serial]
async fn cart_mutation_flow() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(FakeGateway::new())).await?;
    let user = auth_user();

    let tee_s = Uuid::new_v4();
    let tee_m = Uuid::new_v4();
    let mug_std = Uuid::new_v4();
    let tee = seed_product(&state, "Graphic Tee", 2_500, &[(tee_s, 10), (tee_m, 10)]).await?;
    let mug = seed_product(&state, "Camp Mug", 1_200, &[(mug_std, 5)]).await?;

    // First add creates the cart lazily.
    let cart = cart_service::add_to_cart(&state, &user, item(tee, tee_s, 2), "USD")
        .await?
        .data
        .unwrap();
    assert_count_invariant(&cart);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);

    // Same (product, variant) pair merges instead of duplicating.
    let cart = cart_service::add_to_cart(&state, &user, item(tee, tee_s, 3), "USD")
        .await?
        .data
        .unwrap();
    assert_count_invariant(&cart);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);

    // Stacking past the stock bound reports the capacity error and leaves
    // the cart untouched.
    let err = cart_service::add_to_cart(&state, &user, item(tee, tee_s, 20), "USD")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)), "got {err:?}");
    let cart = cart_service::get_cart(&state, &user, "USD").await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, 5);

    // A second product becomes the most recent line item.
    let cart = cart_service::add_to_cart(&state, &user, item(mug, mug_std, 1), "USD")
        .await?
        .data
        .unwrap();
    assert_count_invariant(&cart);
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.items[0].product.id, mug, "latest activity surfaces first");
    assert_eq!(cart.items[1].product.id, tee);

    // Stale old_quantity is a conflict and must not change anything.
    let err = cart_service::update_product_quantity_to_cart(
        &state,
        &user,
        UpdateQuantityRequest {
            product_id: tee,
            variant_id: tee_s,
            quantity: 3,
            old_quantity: 4,
        },
        "USD",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
    let cart = cart_service::get_cart(&state, &user, "USD").await?.data.unwrap();
    assert_eq!(cart.items[1].quantity, 5, "conflict left the cart unchanged");

    // Matching old_quantity applies the delta.
    let cart = cart_service::update_product_quantity_to_cart(
        &state,
        &user,
        UpdateQuantityRequest {
            product_id: tee,
            variant_id: tee_s,
            quantity: 4,
            old_quantity: 5,
        },
        "USD",
    )
    .await?
    .data
    .unwrap();
    assert_count_invariant(&cart);
    assert_eq!(cart.items[1].quantity, 4);

    // Variant switch with no collision rewrites in place.
    let cart = cart_service::update_variant_to_cart(
        &state,
        &user,
        UpdateVariantRequest {
            product_id: tee,
            old_variant_id: tee_s,
            variant_id: tee_m,
        },
        "USD",
    )
    .await?
    .data
    .unwrap();
    assert_count_invariant(&cart);
    assert_eq!(cart.items.len(), 2);
    assert!(cart
        .items
        .iter()
        .any(|line| line.product.id == tee && line.variant_id == tee_m));

    // Re-add the old variant, then switch it onto the existing one: the two
    // line items collapse into one and their quantities sum.
    let cart = cart_service::add_to_cart(&state, &user, item(tee, tee_s, 1), "USD")
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 3);
    let cart = cart_service::update_variant_to_cart(
        &state,
        &user,
        UpdateVariantRequest {
            product_id: tee,
            old_variant_id: tee_s,
            variant_id: tee_m,
        },
        "USD",
    )
    .await?
    .data
    .unwrap();
    assert_count_invariant(&cart);
    assert_eq!(cart.items.len(), 2, "merge collapses two line items into one");
    let merged = cart
        .items
        .iter()
        .find(|line| line.product.id == tee && line.variant_id == tee_m)
        .unwrap();
    assert_eq!(merged.quantity, 5);

    // Quantity zero routes to removal.
    let cart = cart_service::update_product_quantity_to_cart(
        &state,
        &user,
        UpdateQuantityRequest {
            product_id: mug,
            variant_id: mug_std,
            quantity: 0,
            old_quantity: 1,
        },
        "USD",
    )
    .await?
    .data
    .unwrap();
    assert_count_invariant(&cart);
    assert_eq!(cart.items.len(), 1);

    // Batch removal empties the cart but the cart document itself survives.
    let cart = cart_service::delete_from_cart(
        &state,
        &user,
        vec![LineItemKeyInput {
            product_id: tee,
            variant_id: tee_m,
        }],
        "USD",
    )
    .await?
    .data
    .unwrap();
    assert_count_invariant(&cart);
    assert!(cart.items.is_empty());

    let cart = cart_service::get_cart(&state, &user, "USD").await?.data.unwrap();
    assert_eq!(cart.item_count, 0, "empty cart still resolves, not NOT_FOUND");

    Ok(())
}

// Two concurrent adds for the same user must both land: the store mutates
// line items with per-row atomic operations, never whole-document rewrites.
#[tokio::test]
#[serial]
async fn concurrent_adds_lose_no_update() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(FakeGateway::new())).await?;
    let user = auth_user();

    let v1 = Uuid::new_v4();
    let v2 = Uuid::new_v4();
    let left = seed_product(&state, "Left Sock", 500, &[(v1, 10)]).await?;
    let right = seed_product(&state, "Right Sock", 500, &[(v2, 10)]).await?;

    let (a, b) = tokio::join!(
        cart_service::add_to_cart(&state, &user, item(left, v1, 1), "USD"),
        cart_service::add_to_cart(&state, &user, item(right, v2, 1), "USD"),
    );
    a?;
    b?;

    let cart = cart_service::get_cart(&state, &user, "USD").await?.data.unwrap();
    assert_eq!(cart.item_count, 2);
    assert!(cart.items.iter().any(|line| line.product.id == left));
    assert!(cart.items.iter().any(|line| line.product.id == right));

    Ok(())
}

// Unknown variants and exhausted stock both surface as UNAVAILABLE.
#[tokio::test]
#[serial]
async fn unavailable_item_rejected_before_any_write() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(FakeGateway::new())).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Limited Print", 9_900, &[(variant, 2)]).await?;

    let err = cart_service::add_to_cart(&state, &user, item(product, variant, 3), "USD")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));

    let err = cart_service::add_to_cart(&state, &user, item(product, Uuid::new_v4(), 1), "USD")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));

    // Nothing was written: no cart document exists yet.
    let err = cart_service::get_cart(&state, &user, "USD").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}
