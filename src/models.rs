use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Product snapshot with discount-adjusted, currency-converted pricing.
/// `old_price` is present only when at least one discount applied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricedProduct {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub old_price: Option<i64>,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartLineItem {
    pub product: PricedProduct,
    pub variant_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub user_id: Uuid,
    pub item_count: i32,
    pub items: Vec<CartLineItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentState,
    pub paypal_order_id: Option<String>,
    pub invoice_number: String,
    pub shipping_address: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

/// Order lifecycle. Linear happy path with cancellation reachable from any
/// state before the parcel leaves the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Confirmed,
    Shipping,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "confirmed" => Some(OrderStatus::Confirmed),
            "shipping" => Some(OrderStatus::Shipping),
            "completed" => Some(OrderStatus::Completed),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    pub fn can_transition(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, to) {
            (Pending, Paid) => true,
            (Paid, Confirmed) => true,
            (Confirmed, Shipping) => true,
            (Shipping, Completed) => true,
            (from, Canceled) => from.can_cancel(),
            _ => false,
        }
    }

    /// Cancellation window closes once the order reaches shipping.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Confirmed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Paypal,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Paypal => "paypal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cod" => Some(PaymentMethod::Cod),
            "paypal" => Some(PaymentMethod::Paypal),
            _ => None,
        }
    }
}

/// Gateway-side payment phase, tracked explicitly instead of being inferred
/// from the success or failure of individual gateway calls. Offline methods
/// stay `Unpaid` until fulfilment; gateway-backed orders walk
/// `Created -> CapturePending -> Captured | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Unpaid,
    Created,
    CapturePending,
    Captured,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Unpaid => "unpaid",
            PaymentState::Created => "created",
            PaymentState::CapturePending => "capture_pending",
            PaymentState::Captured => "captured",
            PaymentState::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(PaymentState::Unpaid),
            "created" => Some(PaymentState::Created),
            "capture_pending" => Some(PaymentState::CapturePending),
            "captured" => Some(PaymentState::Captured),
            "failed" => Some(PaymentState::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition(Paid));
        assert!(Paid.can_transition(Confirmed));
        assert!(Confirmed.can_transition(Shipping));
        assert!(Shipping.can_transition(Completed));
        assert!(!Pending.can_transition(Confirmed));
        assert!(!Paid.can_transition(Completed));
    }

    #[test]
    fn cancel_window_closes_at_shipping() {
        use OrderStatus::*;
        assert!(Pending.can_cancel());
        assert!(Paid.can_cancel());
        assert!(Confirmed.can_cancel());
        assert!(!Shipping.can_cancel());
        assert!(!Completed.can_cancel());
        assert!(!Canceled.can_cancel());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        use OrderStatus::*;
        for to in [Pending, Paid, Confirmed, Shipping, Completed, Canceled] {
            assert!(!Completed.can_transition(to));
            assert!(!Canceled.can_transition(to));
        }
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        use OrderStatus::*;
        for status in [Pending, Paid, Confirmed, Shipping, Completed, Canceled] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("refunded"), None);
    }
}
