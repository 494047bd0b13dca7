use anyhow::{Context, Result, bail};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between Stripe's signature timestamp and ours.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Thin client for the Stripe REST API. Stripe owns all card-processing
/// state; this side only creates payment intents and consumes webhooks.
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Metadata attached to a payment intent so the webhook can link the
/// settled payment back to the marketplace records.
pub struct IntentMetadata<'a> {
    pub campaign_id: &'a str,
    pub creator_id: &'a str,
    pub brand_id: &'a str,
    pub application_id: Option<&'a str>,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, "https://api.stripe.com".into())
    }

    /// Test seam: point the client at a stub server.
    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            base_url,
        }
    }

    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &IntentMetadata<'_>,
    ) -> Result<PaymentIntent> {
        let mut form: Vec<(&str, String)> = vec![
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[campaign_id]", metadata.campaign_id.to_string()),
            ("metadata[creator_id]", metadata.creator_id.to_string()),
            ("metadata[brand_id]", metadata.brand_id.to_string()),
        ];
        if let Some(application_id) = metadata.application_id {
            form.push(("metadata[application_id]", application_id.to_string()));
        }

        let resp = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("stripe request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            bail!("stripe returned {}: {}", status, detail);
        }

        let intent = resp.json().await.context("invalid stripe response")?;
        Ok(intent)
    }
}

/// Verify a `Stripe-Signature` header (`t=...,v1=...`) against the raw
/// webhook payload: HMAC-SHA256 over `"{t}.{payload}"` with the webhook
/// secret, compared in constant time, with a bounded timestamp skew.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now_unix: i64,
) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if candidates.is_empty() || (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    candidates.iter().any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Compute a valid signature header for a payload. Test helper.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
