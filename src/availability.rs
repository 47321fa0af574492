use sqlx::FromRow;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// One requested line item, as the availability check sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct AvailableItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub stock: i32,
}

#[derive(FromRow)]
struct StockRow {
    stock: i32,
}

/// Check whether each requested item can be fulfilled at its requested
/// quantity. Returns one entry per input item, in input order; `None` means
/// the item cannot be fulfilled (unknown variant and insufficient stock are
/// deliberately not distinguished — the catalog offers no richer signal).
pub async fn check_available(
    pool: &DbPool,
    items: &[ItemRequest],
) -> AppResult<Vec<Option<AvailableItem>>> {
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let row: Option<StockRow> = sqlx::query_as(
            "SELECT stock FROM product_variants WHERE id = $1 AND product_id = $2",
        )
        .bind(item.variant_id)
        .bind(item.product_id)
        .fetch_optional(pool)
        .await?;

        let available = row.filter(|r| r.stock >= item.quantity).map(|r| AvailableItem {
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            stock: r.stock,
        });
        results.push(available);
    }
    Ok(results)
}

/// Convenience for the common "all or nothing" callers.
pub fn all_available(results: &[Option<AvailableItem>]) -> bool {
    results.iter().all(|r| r.is_some())
}
