use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_storefront_api::{
    db::{create_orm_conn, create_pool},
    gateway::{
        CaptureResult, CaptureStatus, GatewayError, GatewayOrderStatus, PaymentGateway,
    },
    middleware::auth::AuthUser,
    state::AppState,
};
use sea_orm::{ConnectionTrait, Statement};
use uuid::Uuid;

/// Resolve the test database, or `None` to skip the DB-backed tests.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

pub async fn setup_state(
    database_url: &str,
    gateway: Arc<dyn PaymentGateway>,
) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let orm = create_orm_conn(database_url).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE paypal_captures, order_items, orders, cart_items, carts, \
         discount_products, discounts, product_variants, products, currency_rates, audit_logs \
         RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState { pool, orm, gateway })
}

pub fn auth_user() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    }
}

pub async fn seed_product(
    state: &AppState,
    title: &str,
    price: i64,
    variants: &[(Uuid, i32)],
) -> anyhow::Result<Uuid> {
    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, title, price) VALUES ($1, $2, $3)")
        .bind(product_id)
        .bind(title)
        .bind(price)
        .execute(&state.pool)
        .await?;

    for (variant_id, stock) in variants {
        sqlx::query(
            "INSERT INTO product_variants (id, product_id, name, stock) VALUES ($1, $2, $3, $4)",
        )
        .bind(variant_id)
        .bind(product_id)
        .bind(format!("variant-{variant_id}"))
        .bind(stock)
        .execute(&state.pool)
        .await?;
    }

    Ok(product_id)
}

pub async fn seed_discount(
    state: &AppState,
    kind: &str,
    value: i64,
    apply_all: bool,
    product_ids: &[Uuid],
) -> anyhow::Result<()> {
    let discount_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO discounts (id, title, kind, value, apply_all) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(discount_id)
    .bind(format!("{kind} {value}"))
    .bind(kind)
    .bind(value)
    .bind(apply_all)
    .execute(&state.pool)
    .await?;

    for product_id in product_ids {
        sqlx::query("INSERT INTO discount_products (discount_id, product_id) VALUES ($1, $2)")
            .bind(discount_id)
            .bind(product_id)
            .execute(&state.pool)
            .await?;
    }

    Ok(())
}

pub async fn variant_stock(state: &AppState, variant_id: Uuid) -> anyhow::Result<i32> {
    let row: (i32,) = sqlx::query_as("SELECT stock FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(row.0)
}

/// In-memory gateway double. Tracks which gateway orders it considers
/// captured, so duplicate captures report `AlreadyCaptured` like the real
/// provider, and can simulate one ambiguous timeout in which the charge
/// actually went through.
pub struct FakeGateway {
    pub capture_calls: AtomicUsize,
    captured: Mutex<HashSet<String>>,
    timeout_next_capture: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            capture_calls: AtomicUsize::new(0),
            captured: Mutex::new(HashSet::new()),
            timeout_next_capture: AtomicBool::new(false),
        }
    }

    pub fn timeout_next_capture(&self) {
        self.timeout_next_capture.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, _total: i64, _currency: &str) -> Result<String, GatewayError> {
        Ok(format!("FAKE-{}", Uuid::new_v4()))
    }

    async fn capture_order(&self, gateway_order_id: &str) -> Result<CaptureResult, GatewayError> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        let mut captured = self.captured.lock().unwrap();

        if self.timeout_next_capture.swap(false, Ordering::SeqCst) {
            // The request "times out" but the charge lands anyway.
            captured.insert(gateway_order_id.to_string());
            return Err(GatewayError::Timeout);
        }

        if captured.contains(gateway_order_id) {
            return Ok(CaptureResult {
                status: CaptureStatus::AlreadyCaptured,
                amount: None,
            });
        }

        captured.insert(gateway_order_id.to_string());
        Ok(CaptureResult {
            status: CaptureStatus::Captured,
            amount: None,
        })
    }

    async fn order_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError> {
        let captured = self.captured.lock().unwrap();
        if captured.contains(gateway_order_id) {
            Ok(GatewayOrderStatus::Captured)
        } else {
            Ok(GatewayOrderStatus::NotCaptured)
        }
    }
}
