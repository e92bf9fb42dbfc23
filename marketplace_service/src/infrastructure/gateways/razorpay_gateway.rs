use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use crate::domain::error::{Error, ErrorKind};
use crate::domain::gateways::PaymentGateway;

const RAZORPAY_BASE_URL: &str = "https://api.razorpay.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct GatewayOrderResponse {
    id: String,
}

/// Cliente REST de Razorpay: creación de órdenes de cobro con Basic auth y
/// verificación de la firma HMAC de los webhooks.
pub struct RazorpayGateway {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
    base_url: String,
}

impl RazorpayGateway {
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Result<Self, Error> {
        const OP: &str = "razorpay.new";

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::internal(OP, e))?;

        Ok(Self {
            http,
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
            base_url: RAZORPAY_BASE_URL.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, amount_minor: i64, receipt: &str) -> Result<String, Error> {
        const OP: &str = "razorpay.create_order";

        if amount_minor <= 0 {
            return Err(Error::invalid(OP, "amount must be greater than zero"));
        }

        let body = json!({
            "amount": amount_minor,
            "currency": "INR",
            "receipt": receipt,
            "payment_capture": 1,
        });

        let response = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorKind::GatewayError, OP, "gateway request failed").with_source(e)
            })?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(Error::new(
                ErrorKind::GatewayError,
                OP,
                format!("gateway returned status {status}"),
            ));
        }

        let order: GatewayOrderResponse = response.json().await.map_err(|e| {
            Error::new(ErrorKind::GatewayError, OP, "invalid gateway response").with_source(e)
        })?;

        Ok(order.id)
    }

    /// Compara `hex(HMAC-SHA256(webhook_secret, body))` contra el header.
    /// La comparación es en tiempo constante vía `verify_slice`.
    fn verify_webhook_signature(&self, body: &[u8], signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }

    fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature_hex: &str,
    ) -> bool {
        let Ok(expected) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.key_secret.as_bytes()) else {
            return false;
        };
        mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RazorpayGateway {
        RazorpayGateway::new("rzp_test_key", "rzp_test_secret", "whsec_test").unwrap()
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let gw = gateway();
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign("whsec_test", body);

        assert!(gw.verify_webhook_signature(body, &signature));
    }

    #[test]
    fn test_signature_with_wrong_secret_rejected() {
        let gw = gateway();
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign("another_secret", body);

        assert!(!gw.verify_webhook_signature(body, &signature));
    }

    #[test]
    fn test_signature_over_different_body_rejected() {
        let gw = gateway();
        let signature = sign("whsec_test", b"original body");

        assert!(!gw.verify_webhook_signature(b"tampered body", &signature));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let gw = gateway();

        assert!(!gw.verify_webhook_signature(b"body", "not-hex!"));
        assert!(!gw.verify_webhook_signature(b"body", ""));
        assert!(!gw.verify_webhook_signature(b"body", "abcd"));
    }

    #[test]
    fn test_payment_signature_round_trip() {
        let gw = gateway();
        let signature = sign("rzp_test_secret", b"order_abc|pay_xyz");

        assert!(gw.verify_payment_signature("order_abc", "pay_xyz", &signature));
        assert!(!gw.verify_payment_signature("order_abc", "pay_other", &signature));
        assert!(!gw.verify_payment_signature("order_abc", "pay_xyz", "deadbeef"));
    }
}
