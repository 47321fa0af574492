use serde::Serialize;
use utoipa::ToSchema;

use crate::models::PricedProduct;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<PricedProduct>,
}
