use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// One line item as submitted by the client.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct CartItemInput {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddProductsToCartRequest {
    pub products: Vec<CartItemInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    /// New absolute quantity; zero removes the line item.
    pub quantity: i32,
    /// Quantity the client last saw; a mismatch with the stored value is a
    /// conflict.
    pub old_quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateVariantRequest {
    pub product_id: Uuid,
    pub old_variant_id: Uuid,
    pub variant_id: Uuid,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct LineItemKeyInput {
    pub product_id: Uuid,
    pub variant_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveFromCartRequest {
    pub products: Vec<LineItemKeyInput>,
}
