//! Cart persistence primitives. Every mutation is a single atomic statement
//! (or a short transaction keeping the denormalized item count in sync), so
//! two concurrent requests against the same user's cart can interleave at
//! the row level without losing either update. Nothing here reads a cart,
//! edits it in memory and writes it back.

use sqlx::FromRow;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

#[derive(Debug, Clone, Copy)]
pub struct NewLineItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// (product, variant) pair identifying one line item within a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItemKey {
    pub product_id: Uuid,
    pub variant_id: Uuid,
}

#[derive(Debug, FromRow)]
pub struct StoredLineItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug)]
pub struct StoredCart {
    pub user_id: Uuid,
    pub item_count: i32,
    /// Line items in storage order (oldest insertion first).
    pub items: Vec<StoredLineItem>,
}

impl StoredCart {
    pub fn find_item(&self, product_id: Uuid, variant_id: Uuid) -> Option<&StoredLineItem> {
        self.items
            .iter()
            .find(|item| item.product_id == product_id && item.variant_id == variant_id)
    }
}

#[derive(FromRow)]
struct CartRow {
    user_id: Uuid,
    item_count: i32,
}

/// Ensure the user's cart exists and attach `item` to it. Safe to call when
/// the cart already exists: the upsert is additive, so line items added by
/// concurrent requests are never clobbered.
pub async fn create_or_attach(pool: &DbPool, user_id: Uuid, item: NewLineItem) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO carts (user_id, item_count) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO cart_items (user_id, product_id, variant_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id, variant_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(item.product_id)
    .bind(item.variant_id)
    .bind(item.quantity)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted > 0 {
        sqlx::query(
            "UPDATE carts SET item_count = item_count + 1, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Insert a new line item unless the (product, variant) pair is already
/// present (set semantics). Returns whether a row was actually inserted.
pub async fn add_line_item(pool: &DbPool, user_id: Uuid, item: NewLineItem) -> AppResult<bool> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO cart_items (user_id, product_id, variant_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id, variant_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(item.product_id)
    .bind(item.variant_id)
    .bind(item.quantity)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted > 0 {
        sqlx::query(
            "UPDATE carts SET item_count = item_count + 1, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(inserted > 0)
}

/// Atomically adjust the quantity of exactly one line item by `delta`,
/// refusing any result below `floor`. Returns the number of rows touched;
/// zero means no matching item (or the floor would be crossed).
pub async fn increment_quantity(
    pool: &DbPool,
    user_id: Uuid,
    product_id: Uuid,
    variant_id: Uuid,
    delta: i32,
    floor: i32,
) -> AppResult<u64> {
    let updated = sqlx::query(
        r#"
        UPDATE cart_items
        SET quantity = quantity + $4
        WHERE user_id = $1 AND product_id = $2 AND variant_id = $3
          AND quantity + $4 >= $5
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(variant_id)
    .bind(delta)
    .bind(floor)
    .execute(pool)
    .await?
    .rows_affected();

    if updated > 0 {
        sqlx::query("UPDATE carts SET updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    Ok(updated)
}

/// Remove a batch of (product, variant) pairs in one statement and decrement
/// the item count by the number of rows actually removed.
pub async fn remove_line_items(
    pool: &DbPool,
    user_id: Uuid,
    keys: &[LineItemKey],
) -> AppResult<u64> {
    if keys.is_empty() {
        return Ok(0);
    }

    let product_ids: Vec<Uuid> = keys.iter().map(|k| k.product_id).collect();
    let variant_ids: Vec<Uuid> = keys.iter().map(|k| k.variant_id).collect();

    let mut tx = pool.begin().await?;

    let removed = sqlx::query(
        r#"
        DELETE FROM cart_items
        WHERE user_id = $1
          AND (product_id, variant_id) IN (SELECT * FROM UNNEST($2::uuid[], $3::uuid[]))
        "#,
    )
    .bind(user_id)
    .bind(&product_ids)
    .bind(&variant_ids)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if removed > 0 {
        sqlx::query(
            "UPDATE carts SET item_count = item_count - $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(removed as i32)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(removed)
}

/// Rewrite the variant id of one line item in place. The caller has already
/// ruled out a collision with an existing (product, new variant) pair.
pub async fn set_variant(
    pool: &DbPool,
    user_id: Uuid,
    product_id: Uuid,
    old_variant_id: Uuid,
    new_variant_id: Uuid,
) -> AppResult<u64> {
    let updated = sqlx::query(
        r#"
        UPDATE cart_items
        SET variant_id = $4
        WHERE user_id = $1 AND product_id = $2 AND variant_id = $3
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(old_variant_id)
    .bind(new_variant_id)
    .execute(pool)
    .await?
    .rows_affected();

    if updated > 0 {
        sqlx::query("UPDATE carts SET updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    Ok(updated)
}

/// Load the raw cart, or `None` when the user has no cart document at all.
/// An existing cart with zero items is returned as-is, not as `None`.
pub async fn fetch(pool: &DbPool, user_id: Uuid) -> AppResult<Option<StoredCart>> {
    let cart: Option<CartRow> =
        sqlx::query_as("SELECT user_id, item_count FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let Some(cart) = cart else {
        return Ok(None);
    };

    let items: Vec<StoredLineItem> = sqlx::query_as(
        r#"
        SELECT product_id, variant_id, quantity
        FROM cart_items
        WHERE user_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(StoredCart {
        user_id: cart.user_id,
        item_count: cart.item_count,
        items,
    }))
}
