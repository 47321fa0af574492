use axum_storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

// Seed a small catalog with variants, overlapping discounts and a couple of
// exchange rates, enough to exercise the cart and checkout flows by hand.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let tee = seed_product(
        &pool,
        "Graphic Tee",
        Some("Cotton t-shirt with print"),
        2_500,
        &[("S", 50), ("M", 50), ("L", 25)],
    )
    .await?;
    let hoodie = seed_product(
        &pool,
        "Zip Hoodie",
        Some("Fleece-lined zip hoodie"),
        10_000,
        &[("M", 20), ("L", 10)],
    )
    .await?;
    let mug = seed_product(&pool, "Camp Mug", None, 1_200, &[("12oz", 100)]).await?;

    // Storewide 10% plus a fixed 5.00 off the hoodie; the two stack.
    seed_discount(&pool, "Storewide 10%", "percentage", 10, true, &[]).await?;
    seed_discount(&pool, "Hoodie 5 off", "fixed", 500, false, &[hoodie]).await?;

    seed_rate(&pool, "EUR", 0.92).await?;
    seed_rate(&pool, "GBP", 0.79).await?;

    println!("Seed completed. Products: {tee}, {hoodie}, {mug}");
    Ok(())
}

async fn seed_product(
    pool: &sqlx::PgPool,
    title: &str,
    description: Option<&str>,
    price: i64,
    variants: &[(&str, i32)],
) -> anyhow::Result<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO products (id, title, description, price)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(description)
    .bind(price)
    .fetch_one(pool)
    .await?;

    for (name, stock) in variants {
        sqlx::query(
            "INSERT INTO product_variants (id, product_id, name, stock) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(row.0)
        .bind(name)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    Ok(row.0)
}

async fn seed_discount(
    pool: &sqlx::PgPool,
    title: &str,
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
    .bind(title)
    .bind(kind)
    .bind(value)
    .bind(apply_all)
    .execute(pool)
    .await?;

    for product_id in product_ids {
        sqlx::query("INSERT INTO discount_products (discount_id, product_id) VALUES ($1, $2)")
            .bind(discount_id)
            .bind(product_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn seed_rate(pool: &sqlx::PgPool, code: &str, rate: f64) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO currency_rates (code, rate)
        VALUES ($1, $2)
        ON CONFLICT (code) DO UPDATE SET rate = EXCLUDED.rate, updated_at = now()
        "#,
    )
    .bind(code)
    .bind(rate)
    .execute(pool)
    .await?;
    Ok(())
}
