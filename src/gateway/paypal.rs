//! PayPal Orders v2 REST client. Covers the three calls the checkout engine
//! needs: create, capture, and the status lookup used to resolve ambiguous
//! capture outcomes. Every request is bounded by the configured timeout.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use crate::config::AppConfig;

use super::{
    CaptureResult, CaptureStatus, GatewayError, GatewayOrderStatus, PaymentGateway,
};

pub struct PaypalGateway {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
}

#[derive(Deserialize)]
struct OrderStatusResponse {
    status: String,
}

#[derive(Deserialize)]
struct CaptureResponse {
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Deserialize, Default)]
struct PurchaseUnit {
    #[serde(default)]
    payments: Option<Payments>,
}

#[derive(Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Deserialize)]
struct Capture {
    amount: Amount,
}

#[derive(Deserialize)]
struct Amount {
    value: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    issue: String,
}

impl PaypalGateway {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.paypal_base_url.clone(),
            client_id: config.paypal_client_id.clone(),
            client_secret: config.paypal_client_secret.clone(),
        })
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "token request failed with status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(GatewayError::from_reqwest)?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for PaypalGateway {
    async fn create_order(&self, total: i64, currency: &str) -> Result<String, GatewayError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": currency,
                    "value": format_amount(total),
                }
            }]
        });

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "create order failed with status {}",
                response.status()
            )));
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(GatewayError::from_reqwest)?;
        Ok(created.id)
    }

    async fn capture_order(&self, gateway_order_id: &str) -> Result<CaptureResult, GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.base_url, gateway_order_id
            ))
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        let status = response.status();

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            // A duplicate capture of the same order comes back as 422 with
            // an ORDER_ALREADY_CAPTURED issue; funds moved exactly once.
            let body: ErrorBody = response.json().await.unwrap_or(ErrorBody { details: vec![] });
            if body
                .details
                .iter()
                .any(|d| d.issue == "ORDER_ALREADY_CAPTURED")
            {
                return Ok(CaptureResult {
                    status: CaptureStatus::AlreadyCaptured,
                    amount: None,
                });
            }
            return Ok(CaptureResult {
                status: CaptureStatus::Failed,
                amount: None,
            });
        }

        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "capture failed with status {status}"
            )));
        }

        let captured: CaptureResponse = response
            .json()
            .await
            .map_err(GatewayError::from_reqwest)?;

        if captured.status != "COMPLETED" {
            return Ok(CaptureResult {
                status: CaptureStatus::Failed,
                amount: None,
            });
        }

        let amount = captured
            .purchase_units
            .first()
            .and_then(|unit| unit.payments.as_ref())
            .and_then(|payments| payments.captures.first())
            .and_then(|capture| parse_amount(&capture.amount.value));

        Ok(CaptureResult {
            status: CaptureStatus::Captured,
            amount,
        })
    }

    async fn order_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayOrderStatus, GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!(
                "{}/v2/checkout/orders/{}",
                self.base_url, gateway_order_id
            ))
            .bearer_auth(token)
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "status lookup failed with status {}",
                response.status()
            )));
        }

        let body: OrderStatusResponse = response
            .json()
            .await
            .map_err(GatewayError::from_reqwest)?;

        if body.status == "COMPLETED" {
            Ok(GatewayOrderStatus::Captured)
        } else {
            Ok(GatewayOrderStatus::NotCaptured)
        }
    }
}

/// Render cents as the "units.cc" decimal string PayPal expects.
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Parse a "units.cc" decimal string back into cents.
pub fn parse_amount(value: &str) -> Option<i64> {
    let (units, fraction) = value.split_once('.')?;
    let units: i64 = units.parse().ok()?;
    let fraction = match fraction.len() {
        2 => fraction.parse::<i64>().ok()?,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => return None,
    };
    Some(units * 100 + fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents_as_decimal_string() {
        assert_eq!(format_amount(8_500), "85.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(120_000), "1200.00");
    }

    #[test]
    fn parses_decimal_string_back_to_cents() {
        assert_eq!(parse_amount("85.00"), Some(8_500));
        assert_eq!(parse_amount("0.05"), Some(5));
        assert_eq!(parse_amount("12.5"), Some(1_250));
        assert_eq!(parse_amount("not-money"), None);
    }
}
