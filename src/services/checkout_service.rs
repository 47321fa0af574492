//! Checkout and order engine: read-only review, order placement with an
//! authoritative availability check, cancellation with stock release, and
//! the two-phase PayPal flow (create, then capture). The gateway owns
//! capture state; the local order owns fulfilment state; ambiguous gateway
//! outcomes are resolved against the gateway's authoritative record before
//! any failure is surfaced.

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CapturePaypalOrderRequest, CheckoutItem, CreatePaypalOrderRequest, OrderList,
        OrderRequest, OrderWithItems, PaypalOrderCreated, ReviewLine, ReviewRequest,
        ReviewSummary,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders,
            Model as OrderModel,
        },
        paypal_captures::{ActiveModel as CaptureActive, Column as CaptureCol, Entity as PaypalCaptures},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
    },
    error::{AppError, AppResult},
    gateway::{CaptureStatus, GatewayOrderStatus},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentState},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::catalog_service,
    state::AppState,
    store::cart_store::{self, LineItemKey},
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let mut orders = Vec::new();
    for model in finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
    {
        orders.push(order_from_entity(model)?);
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_user_order(state, user, OrderCol::Id.eq(id)).await?;
    let items = load_items(state, order.id).await?;
    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Price the requested items for cart-page display. Read-only: no writes, no
/// availability lock; stock is only authoritatively checked at commit time.
pub async fn review(
    state: &AppState,
    _user: &AuthUser,
    payload: ReviewRequest,
) -> AppResult<ApiResponse<ReviewSummary>> {
    let currency = catalog_service::normalize_currency(payload.currency);
    validate_items(&payload.items)?;

    let mut lines = Vec::with_capacity(payload.items.len());
    let mut total: i64 = 0;
    for item in &payload.items {
        let product = catalog_service::get_priced(&state.orm, item.product_id, &currency).await?;
        let line_total = product.price * item.quantity as i64;
        total += line_total;
        lines.push(ReviewLine {
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            unit_price: product.price,
            old_unit_price: product.old_price,
            line_total,
        });
    }

    Ok(ApiResponse::success(
        "OK",
        ReviewSummary {
            items: lines,
            total_amount: total,
            currency,
        },
        Some(Meta::empty()),
    ))
}

pub async fn order(
    state: &AppState,
    user: &AuthUser,
    payload: OrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let method = PaymentMethod::parse(&payload.payment_method)
        .ok_or_else(|| AppError::BadRequest("Unknown payment method".to_string()))?;
    let currency = catalog_service::normalize_currency(payload.currency);

    let (order, items) = place_order(
        state,
        user,
        &payload.items,
        method,
        currency,
        payload.shipping_address,
    )
    .await?;

    let order = if method == PaymentMethod::Paypal {
        attach_gateway_order(state, order).await?
    } else {
        order
    };

    clear_ordered_items(state, user, &payload.items).await;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_created",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let items = items
        .into_iter()
        .map(order_item_from_entity)
        .collect();
    Ok(ApiResponse::success(
        "Order successfully",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_user_order(state, user, OrderCol::Id.eq(order_id)).await?;
    let order = cancel_and_release(state, order.id).await?;

    if PaymentState::parse(&order.payment_status) == Some(PaymentState::Captured) {
        // Refund execution belongs to the payment collaborator; record the
        // intent so the reconciliation job picks it up.
        tracing::info!(order_id = %order.id, "captured order canceled, refund initiation recorded");
        if let Err(err) = log_audit(
            &state.pool,
            Some(user.user_id),
            "refund_requested",
            Some("orders"),
            Some(serde_json::json!({ "order_id": order.id })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_canceled",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cancel order successfully",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

/// Phase one of the PayPal flow: place the local order, create the gateway
/// order, hand the gateway-minted id back to the client. No funds move here
/// and nothing is marked paid.
pub async fn create_paypal_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaypalOrderRequest,
) -> AppResult<ApiResponse<PaypalOrderCreated>> {
    let currency = catalog_service::normalize_currency(payload.currency);

    let (order, _items) = place_order(
        state,
        user,
        &payload.items,
        PaymentMethod::Paypal,
        currency,
        payload.shipping_address,
    )
    .await?;

    let order = attach_gateway_order(state, order).await?;
    clear_ordered_items(state, user, &payload.items).await;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "paypal_order_created",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "paypal_order_id": order.paypal_order_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let paypal_order_id = order
        .paypal_order_id
        .clone()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("gateway order id missing after create")))?;

    Ok(ApiResponse::success(
        "Create PayPal order successfully",
        PaypalOrderCreated {
            paypal_order_id,
            order_id: order.id,
            total_amount: order.total_amount,
            currency: order.currency,
        },
        Some(Meta::empty()),
    ))
}

/// Phase two of the PayPal flow. Idempotent under client retries: a replay
/// against an order that is already paid, or a gateway `ALREADY_CAPTURED`
/// response, yields the recorded success result instead of double-applying
/// side effects.
pub async fn capture_paypal_order(
    state: &AppState,
    user: &AuthUser,
    payload: CapturePaypalOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_user_order(
        state,
        user,
        OrderCol::PaypalOrderId.eq(payload.paypal_order_id.clone()),
    )
    .await?;

    if PaymentState::parse(&order.payment_status) == Some(PaymentState::Captured) {
        return capture_success(state, user, order).await;
    }

    // Created -> CapturePending before the gateway call, so an operator can
    // tell an in-flight capture from one that never started.
    let mut active: OrderActive = order.clone().into();
    active.payment_status = Set(PaymentState::CapturePending.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    match state.gateway.capture_order(&payload.paypal_order_id).await {
        Ok(result) => match result.status {
            CaptureStatus::Captured | CaptureStatus::AlreadyCaptured => {
                finalize_capture(state, user, order, result.amount, &payload.order_products).await
            }
            CaptureStatus::Failed => {
                mark_payment_failed(state, order).await?;
                Err(AppError::Gateway("Payment capture was declined".to_string()))
            }
        },
        Err(err) if err.is_ambiguous() => {
            // Unknown outcome: the customer may have been charged. Consult
            // the authoritative record before reporting anything.
            tracing::warn!(
                error = %err,
                paypal_order_id = %payload.paypal_order_id,
                "capture outcome unknown, querying gateway status"
            );
            match state.gateway.order_status(&payload.paypal_order_id).await {
                Ok(GatewayOrderStatus::Captured) => {
                    finalize_capture(state, user, order, None, &payload.order_products).await
                }
                _ => Err(AppError::Gateway(
                    "Payment status could not be confirmed, please retry".to_string(),
                )),
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "capture call failed");
            mark_payment_failed(state, order).await?;
            Err(AppError::Gateway("Payment provider error".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// internals

fn validate_items(items: &[CheckoutItem]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::BadRequest("No products to order".to_string()));
    }
    if items.iter().any(|item| item.quantity < 1) {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

async fn find_user_order(
    state: &AppState,
    user: &AuthUser,
    filter: sea_orm::sea_query::SimpleExpr,
) -> AppResult<OrderModel> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(filter),
        )
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

async fn load_items(state: &AppState, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

/// Freeze prices, decrement stock, persist the order. The stock decrement is
/// a conditional single-statement update per variant, which doubles as the
/// authoritative availability check at commit time; review-time availability
/// is advisory only.
async fn place_order(
    state: &AppState,
    user: &AuthUser,
    items: &[CheckoutItem],
    method: PaymentMethod,
    currency: String,
    shipping_address: Option<String>,
) -> AppResult<(OrderModel, Vec<OrderItemModel>)> {
    validate_items(items)?;

    let mut priced = Vec::with_capacity(items.len());
    let mut total: i64 = 0;
    for item in items {
        let product = catalog_service::get_priced(&state.orm, item.product_id, &currency).await?;
        total += product.price * item.quantity as i64;
        priced.push((item, product));
    }

    let txn = state.orm.begin().await?;

    for (item, product) in &priced {
        let result = ProductVariants::update_many()
            .col_expr(
                VariantCol::Stock,
                Expr::col(VariantCol::Stock).sub(item.quantity),
            )
            .filter(VariantCol::Id.eq(item.variant_id))
            .filter(VariantCol::ProductId.eq(item.product_id))
            .filter(VariantCol::Stock.gte(item.quantity))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::Unavailable(format!(
                "Product {} is not available in the requested quantity",
                product.title
            )));
        }
    }

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        total_amount: Set(total),
        currency: Set(currency),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_method: Set(method.as_str().to_string()),
        payment_status: Set(PaymentState::Unpaid.as_str().to_string()),
        paypal_order_id: Set(None),
        invoice_number: Set(build_invoice_number(order_id)),
        shipping_address: Set(shipping_address),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items = Vec::with_capacity(priced.len());
    for (item, product) in &priced {
        let record = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            variant_id: Set(item.variant_id),
            quantity: Set(item.quantity),
            unit_price: Set(product.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(record);
    }

    txn.commit().await?;
    Ok((order, order_items))
}

/// Create the gateway order for a freshly placed local order and record the
/// gateway-minted id (written exactly once). A gateway failure here
/// compensates by canceling the local order and releasing its stock; no
/// money has moved at this point.
async fn attach_gateway_order(state: &AppState, order: OrderModel) -> AppResult<OrderModel> {
    match state
        .gateway
        .create_order(order.total_amount, &order.currency)
        .await
    {
        Ok(gateway_id) => {
            let mut active: OrderActive = order.into();
            active.paypal_order_id = Set(Some(gateway_id));
            active.payment_status = Set(PaymentState::Created.as_str().to_string());
            active.updated_at = Set(Utc::now().into());
            Ok(active.update(&state.orm).await?)
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                order_id = %order.id,
                "gateway order creation failed, canceling local order"
            );
            if let Err(cancel_err) = cancel_and_release(state, order.id).await {
                tracing::error!(
                    error = %cancel_err,
                    order_id = %order.id,
                    "failed to cancel local order after gateway failure"
                );
            }
            Err(AppError::Gateway(
                "Payment provider is unavailable, the order was not placed".to_string(),
            ))
        }
    }
}

/// Transition an order to CANCELED and put its stock back, in one
/// transaction against a locked order row.
async fn cancel_and_release(state: &AppState, order_id: Uuid) -> AppResult<OrderModel> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let status = parse_status(&order.status)?;
    if !status.can_cancel() {
        return Err(AppError::Conflict(
            "Order can no longer be canceled".to_string(),
        ));
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    for item in &items {
        ProductVariants::update_many()
            .col_expr(
                VariantCol::Stock,
                Expr::col(VariantCol::Stock).add(item.quantity),
            )
            .filter(VariantCol::Id.eq(item.variant_id))
            .exec(&txn)
            .await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Canceled.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;
    Ok(order)
}

/// The gateway reports the money as moved; make the local record agree. If
/// the local write fails the divergence is surfaced as a reconciliation
/// condition rather than a silent failure — a retried capture will find the
/// gateway order already captured and repair the local state.
async fn finalize_capture(
    state: &AppState,
    user: &AuthUser,
    order: OrderModel,
    amount: Option<i64>,
    order_products: &[CheckoutItem],
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order_id = order.id;
    match persist_capture(state, order, amount, order_products).await {
        Ok(order) => {
            if let Err(err) = log_audit(
                &state.pool,
                Some(user.user_id),
                "paypal_capture",
                Some("orders"),
                Some(serde_json::json!({ "order_id": order_id })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }
            capture_success(state, user, order).await
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                order_id = %order_id,
                "payment captured at gateway but local order update failed, reconciliation required"
            );
            Err(AppError::Gateway(
                "Payment was captured but the order could not be updated, retry to reconcile"
                    .to_string(),
            ))
        }
    }
}

async fn persist_capture(
    state: &AppState,
    order: OrderModel,
    amount: Option<i64>,
    order_products: &[CheckoutItem],
) -> AppResult<OrderModel> {
    let paypal_order_id = order
        .paypal_order_id
        .clone()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order has no gateway order id")))?;

    let txn = state.orm.begin().await?;

    let current = Orders::find_by_id(order.id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let current = if PaymentState::parse(&current.payment_status) == Some(PaymentState::Captured) {
        // A concurrent retry won the race; nothing left to apply.
        current
    } else {
        let status = parse_status(&current.status)?;
        if !status.can_transition(OrderStatus::Paid) {
            return Err(AppError::Conflict(
                "Order cannot be marked paid in its current state".to_string(),
            ));
        }
        let mut active: OrderActive = current.into();
        active.status = Set(OrderStatus::Paid.as_str().to_string());
        active.payment_status = Set(PaymentState::Captured.as_str().to_string());
        active.paid_at = Set(Some(Utc::now().into()));
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?
    };

    let capture = CaptureActive {
        paypal_order_id: Set(paypal_order_id),
        order_id: Set(current.id),
        amount: Set(amount),
        items: Set(Some(
            serde_json::to_value(order_products).map_err(anyhow::Error::from)?,
        )),
        captured_at: NotSet,
    };
    PaypalCaptures::insert(capture)
        .on_conflict(
            OnConflict::column(CaptureCol::PaypalOrderId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    txn.commit().await?;
    Ok(current)
}

async fn capture_success(
    state: &AppState,
    _user: &AuthUser,
    order: OrderModel,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let items = load_items(state, order.id).await?;
    Ok(ApiResponse::success(
        "Capture PayPal order successfully",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

async fn mark_payment_failed(state: &AppState, order: OrderModel) -> AppResult<()> {
    let mut active: OrderActive = order.into();
    active.payment_status = Set(PaymentState::Failed.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;
    Ok(())
}

/// Drop the ordered pairs from the customer's cart. Best-effort: the order
/// already committed, so a cart hiccup must not fail the request.
async fn clear_ordered_items(state: &AppState, user: &AuthUser, items: &[CheckoutItem]) {
    let keys: Vec<LineItemKey> = items
        .iter()
        .map(|item| LineItemKey {
            product_id: item.product_id,
            variant_id: item.variant_id,
        })
        .collect();
    if let Err(err) = cart_store::remove_line_items(&state.pool, user.user_id, &keys).await {
        tracing::warn!(error = %err, "cart cleanup after order failed");
    }
}

fn parse_status(value: &str) -> AppResult<OrderStatus> {
    OrderStatus::parse(value)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("invalid order status {value}")))
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = parse_status(&model.status)?;
    let payment_method = PaymentMethod::parse(&model.payment_method)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("invalid payment method")))?;
    let payment_status = PaymentState::parse(&model.payment_status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("invalid payment status")))?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        currency: model.currency,
        status,
        payment_method,
        payment_status,
        paypal_order_id: model.paypal_order_id,
        invoice_number: model.invoice_number,
        shipping_address: model.shipping_address,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        variant_id: model.variant_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn build_invoice_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("INV-{}-{}", date, short)
}
