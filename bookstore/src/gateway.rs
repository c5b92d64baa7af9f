use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use url::Url;

use crate::model::GenericError;
use common::config::RazorpayConfig;

const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1/";

/// Order created on the provider side; its `id` is what the hosted checkout
/// widget is opened with.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key the checkout widget is initialized with.
    fn key_id(&self) -> String;

    /// Creates a provider-side order for `amount_subunits` (currency minor
    /// units, e.g. paise).
    async fn create_order(
        &self,
        amount_subunits: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<ProviderOrder, GenericError>;

    /// Checks the callback signature against the provider's documented
    /// HMAC scheme.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// The provider signs its checkout callback with
/// `HMAC-SHA256(key_secret, order_id + "|" + payment_id)`, hex encoded.
pub fn compute_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: Url,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(config: &RazorpayConfig) -> Result<Self, GenericError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(RAZORPAY_API_BASE)?,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    async fn create_order(
        &self,
        amount_subunits: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<ProviderOrder, GenericError> {
        let url = self.base_url.join("orders")?;
        let body = json!({
            "amount": amount_subunits,
            "currency": currency,
            "receipt": receipt,
        });

        let response = self
            .client
            .post(url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, detail, "gateway order creation failed");
            return Err(format!("gateway order creation failed: {}", status).into());
        }

        let order = response.json::<ProviderOrder>().await?;
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        // Exact string comparison per the provider contract.
        compute_signature(&self.key_secret, order_id, payment_id) == signature
    }
}
