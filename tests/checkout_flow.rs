mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum_storefront_api::{
    dto::{
        cart::CartItemInput,
        orders::{
            CapturePaypalOrderRequest, CheckoutItem, CreatePaypalOrderRequest, OrderRequest,
            ReviewRequest,
        },
    },
    error::AppError,
    models::{OrderStatus, PaymentState},
    services::{cart_service, checkout_service},
};
use common::{auth_user, seed_discount, seed_product, setup_state, variant_stock, FakeGateway};
use serial_test::serial;
use uuid::Uuid;

fn checkout_item(product_id: Uuid, variant_id: Uuid, quantity: i32) -> CheckoutItem {
    CheckoutItem {
        product_id,
        variant_id,
        quantity,
    }
}

// Review is read-only and folds overlapping discounts additively:
// 100.00 with 10% + 5.00 off nets 85.00.
#[tokio::test]
#[serial]
async fn review_prices_with_stacked_discounts() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(FakeGateway::new())).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Wool Blanket", 10_000, &[(variant, 4)]).await?;
    seed_discount(&state, "percentage", 10, true, &[]).await?;
    seed_discount(&state, "fixed", 500, false, &[product]).await?;

    let summary = checkout_service::review(
        &state,
        &user,
        ReviewRequest {
            items: vec![checkout_item(product, variant, 2)],
            currency: None,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(summary.items.len(), 1);
    assert_eq!(summary.items[0].unit_price, 8_500);
    assert_eq!(summary.items[0].old_unit_price, Some(10_000));
    assert_eq!(summary.total_amount, 17_000);

    // No writes, no stock movement.
    assert_eq!(variant_stock(&state, variant).await?, 4);

    Ok(())
}

// Ordering freezes unit prices against later catalog changes, decrements
// stock atomically, and clears the ordered pairs from the cart.
#[tokio::test]
#[serial]
async fn order_freezes_prices_and_decrements_stock() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(FakeGateway::new())).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Desk Lamp", 6_000, &[(variant, 10)]).await?;

    cart_service::add_to_cart(
        &state,
        &user,
        CartItemInput {
            product_id: product,
            variant_id: variant,
            quantity: 2,
        },
        "USD",
    )
    .await?;

    let placed = checkout_service::order(
        &state,
        &user,
        OrderRequest {
            items: vec![checkout_item(product, variant, 2)],
            payment_method: "cod".into(),
            currency: None,
            shipping_address: Some("12 Example Street".into()),
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.total_amount, 12_000);
    assert_eq!(placed.items[0].unit_price, 6_000);
    assert_eq!(variant_stock(&state, variant).await?, 8);

    // The ordered pair is gone from the cart.
    let cart = cart_service::get_cart(&state, &user, "USD").await?.data.unwrap();
    assert!(cart.items.is_empty());

    // A later price hike does not touch the frozen order.
    sqlx::query("UPDATE products SET price = 99999 WHERE id = $1")
        .bind(product)
        .execute(&state.pool)
        .await?;
    let fetched = checkout_service::get_order(&state, &user, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.items[0].unit_price, 6_000);
    assert_eq!(fetched.order.total_amount, 12_000);

    Ok(())
}

// The commit-time availability check is authoritative: an oversized order is
// rejected with UNAVAILABLE and writes nothing.
#[tokio::test]
#[serial]
async fn order_rejected_when_stock_is_short() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(FakeGateway::new())).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Rare Vinyl", 4_500, &[(variant, 1)]).await?;

    let err = checkout_service::order(
        &state,
        &user,
        OrderRequest {
            items: vec![checkout_item(product, variant, 2)],
            payment_method: "cod".into(),
            currency: None,
            shipping_address: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)), "got {err:?}");

    assert_eq!(variant_stock(&state, variant).await?, 1);
    let orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orders.0, 0);

    Ok(())
}

// Capturing the same gateway order twice returns the same success result
// both times and applies the paid-side effects exactly once.
#[tokio::test]
#[serial]
async fn paypal_capture_is_idempotent() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let fake = Arc::new(FakeGateway::new());
    let state = setup_state(&database_url, fake.clone()).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Poster", 3_000, &[(variant, 5)]).await?;
    let items = vec![checkout_item(product, variant, 1)];

    let created = checkout_service::create_paypal_order(
        &state,
        &user,
        CreatePaypalOrderRequest {
            items: items.clone(),
            currency: None,
            shipping_address: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.total_amount, 3_000);

    let request = CapturePaypalOrderRequest {
        paypal_order_id: created.paypal_order_id.clone(),
        order_products: items.clone(),
    };

    let first = checkout_service::capture_paypal_order(&state, &user, request)
        .await?
        .data
        .unwrap();
    assert_eq!(first.order.status, OrderStatus::Paid);
    assert_eq!(first.order.payment_status, PaymentState::Captured);
    let paid_at = first.order.paid_at;

    // Client retry after e.g. a lost response.
    let second = checkout_service::capture_paypal_order(
        &state,
        &user,
        CapturePaypalOrderRequest {
            paypal_order_id: created.paypal_order_id.clone(),
            order_products: items,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(second.order.status, OrderStatus::Paid);
    assert_eq!(second.order.paid_at, paid_at, "paid timestamp not reapplied");

    let captures: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM paypal_captures")
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(captures.0, 1, "captured-items record written exactly once");

    // The replay short-circuits locally; the gateway saw only one capture.
    assert_eq!(fake.capture_calls.load(Ordering::SeqCst), 1);

    Ok(())
}

// A capture timeout is an unknown outcome, not a failure: the engine checks
// the gateway's authoritative status and completes the order when the
// charge actually landed.
#[tokio::test]
#[serial]
async fn ambiguous_capture_resolves_via_status_check() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let fake = Arc::new(FakeGateway::new());
    let state = setup_state(&database_url, fake.clone()).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Keycap Set", 8_000, &[(variant, 3)]).await?;
    let items = vec![checkout_item(product, variant, 1)];

    let created = checkout_service::create_paypal_order(
        &state,
        &user,
        CreatePaypalOrderRequest {
            items: items.clone(),
            currency: None,
            shipping_address: None,
        },
    )
    .await?
    .data
    .unwrap();

    fake.timeout_next_capture();
    let captured = checkout_service::capture_paypal_order(
        &state,
        &user,
        CapturePaypalOrderRequest {
            paypal_order_id: created.paypal_order_id,
            order_products: items,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(captured.order.status, OrderStatus::Paid);
    assert_eq!(captured.order.payment_status, PaymentState::Captured);
    assert_eq!(fake.capture_calls.load(Ordering::SeqCst), 1);

    Ok(())
}

// When the gateway captured but the local write was lost, a retried capture
// sees ALREADY_CAPTURED from the gateway and repairs the local order instead
// of failing or charging twice.
#[tokio::test]
#[serial]
async fn capture_retry_repairs_diverged_local_state() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let fake = Arc::new(FakeGateway::new());
    let state = setup_state(&database_url, fake.clone()).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Enamel Pin", 900, &[(variant, 9)]).await?;
    let items = vec![checkout_item(product, variant, 1)];

    let created = checkout_service::create_paypal_order(
        &state,
        &user,
        CreatePaypalOrderRequest {
            items: items.clone(),
            currency: None,
            shipping_address: None,
        },
    )
    .await?
    .data
    .unwrap();

    checkout_service::capture_paypal_order(
        &state,
        &user,
        CapturePaypalOrderRequest {
            paypal_order_id: created.paypal_order_id.clone(),
            order_products: items.clone(),
        },
    )
    .await?;

    // Roll the local record back, as if the paid-write had been lost after
    // the gateway succeeded.
    sqlx::query(
        "UPDATE orders SET status = 'pending', payment_status = 'created', paid_at = NULL WHERE id = $1",
    )
    .bind(created.order_id)
    .execute(&state.pool)
    .await?;
    sqlx::query("DELETE FROM paypal_captures WHERE paypal_order_id = $1")
        .bind(&created.paypal_order_id)
        .execute(&state.pool)
        .await?;

    let repaired = checkout_service::capture_paypal_order(
        &state,
        &user,
        CapturePaypalOrderRequest {
            paypal_order_id: created.paypal_order_id,
            order_products: items,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(repaired.order.status, OrderStatus::Paid);
    assert_eq!(repaired.order.payment_status, PaymentState::Captured);
    assert_eq!(
        fake.capture_calls.load(Ordering::SeqCst),
        2,
        "second call reached the gateway and saw ALREADY_CAPTURED"
    );

    Ok(())
}

// Cancel releases stock while the order has not shipped, and is refused
// afterwards.
#[tokio::test]
#[serial]
async fn cancel_window_and_stock_release() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&database_url, Arc::new(FakeGateway::new())).await?;
    let user = auth_user();

    let variant = Uuid::new_v4();
    let product = seed_product(&state, "Field Bag", 14_000, &[(variant, 6)]).await?;

    let placed = checkout_service::order(
        &state,
        &user,
        OrderRequest {
            items: vec![checkout_item(product, variant, 2)],
            payment_method: "cod".into(),
            currency: None,
            shipping_address: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(variant_stock(&state, variant).await?, 4);

    let canceled = checkout_service::cancel_order(&state, &user, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(variant_stock(&state, variant).await?, 6, "stock released");

    // Canceling a canceled order is a conflict.
    let err = checkout_service::cancel_order(&state, &user, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Once shipping, cancellation is refused.
    let placed = checkout_service::order(
        &state,
        &user,
        OrderRequest {
            items: vec![checkout_item(product, variant, 1)],
            payment_method: "cod".into(),
            currency: None,
            shipping_address: None,
        },
    )
    .await?
    .data
    .unwrap();
    sqlx::query("UPDATE orders SET status = 'shipping' WHERE id = $1")
        .bind(placed.order.id)
        .execute(&state.pool)
        .await?;
    let err = checkout_service::cancel_order(&state, &user, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    Ok(())
}
