pub mod currency_rates;
pub mod discount_products;
pub mod discounts;
pub mod order_items;
pub mod orders;
pub mod paypal_captures;
pub mod product_variants;
pub mod products;

pub use currency_rates::Entity as CurrencyRates;
pub use discount_products::Entity as DiscountProducts;
pub use discounts::Entity as Discounts;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use paypal_captures::Entity as PaypalCaptures;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
