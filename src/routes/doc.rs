use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{
            AddProductsToCartRequest, CartItemInput, LineItemKeyInput, RemoveFromCartRequest,
            UpdateQuantityRequest, UpdateVariantRequest,
        },
        orders::{
            CapturePaypalOrderRequest, CheckoutItem, CreatePaypalOrderRequest, OrderList,
            OrderRequest, OrderWithItems, PaypalOrderCreated, ReviewLine, ReviewRequest,
            ReviewSummary,
        },
        products::ProductList,
    },
    models::{Cart, CartLineItem, Order, OrderItem, OrderStatus, PaymentMethod, PaymentState, PricedProduct},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::add_products_to_cart,
        cart::update_quantity,
        cart::update_variant,
        cart::remove_from_cart,
        orders::list_orders,
        orders::review,
        orders::place_order,
        orders::get_order,
        orders::cancel_order,
        orders::create_paypal_order,
        orders::capture_paypal_order
    ),
    components(
        schemas(
            PricedProduct,
            Cart,
            CartLineItem,
            Order,
            OrderItem,
            OrderStatus,
            PaymentMethod,
            PaymentState,
            CartItemInput,
            AddProductsToCartRequest,
            UpdateQuantityRequest,
            UpdateVariantRequest,
            LineItemKeyInput,
            RemoveFromCartRequest,
            CheckoutItem,
            ReviewRequest,
            ReviewLine,
            ReviewSummary,
            OrderRequest,
            CreatePaypalOrderRequest,
            PaypalOrderCreated,
            CapturePaypalOrderRequest,
            OrderWithItems,
            OrderList,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::CurrencyQuery,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<PricedProduct>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ReviewSummary>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Read-only priced catalog"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and payment endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
