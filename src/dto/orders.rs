use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

/// One line item in a checkout payload. Also persisted verbatim as part of
/// the captured-items record, hence `Serialize`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub items: Vec<CheckoutItem>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewLine {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub old_unit_price: Option<i64>,
    pub line_total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewSummary {
    pub items: Vec<ReviewLine>,
    pub total_amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderRequest {
    pub items: Vec<CheckoutItem>,
    pub payment_method: String,
    pub currency: Option<String>,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaypalOrderRequest {
    pub items: Vec<CheckoutItem>,
    pub currency: Option<String>,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaypalOrderCreated {
    pub paypal_order_id: String,
    pub order_id: Uuid,
    pub total_amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CapturePaypalOrderRequest {
    pub paypal_order_id: String,
    pub order_products: Vec<CheckoutItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
