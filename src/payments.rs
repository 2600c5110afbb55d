use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the payment processor. None of these details are ever
/// returned to the client.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment processor unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment processor rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("payment intent response carried no client secret")]
    MissingClientSecret,
}

/// PaymentService
///
/// The contract for creating payment intents. The processor is opaque to the
/// rest of the service: it takes an amount and hands back a client secret the
/// browser uses to confirm the payment.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// `amount` is in the smallest currency unit (cents for `usd`).
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<String, PaymentError>;
}

/// PaymentState
pub type PaymentState = Arc<dyn PaymentService>;

#[derive(Deserialize)]
struct PaymentIntentBody {
    client_secret: Option<String>,
}

/// StripePaymentClient
///
/// Talks to a Stripe-compatible `/v1/payment_intents` endpoint with a secret key.
#[derive(Clone)]
pub struct StripePaymentClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripePaymentClient {
    pub fn new(api_base: &str, secret_key: &str) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl PaymentService for StripePaymentClient {
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<String, PaymentError> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let amount = amount.to_string();

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", currency),
                ("payment_method_types[]", "card"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Rejected {
                status: response.status().as_u16(),
            });
        }

        response
            .json::<PaymentIntentBody>()
            .await?
            .client_secret
            .ok_or(PaymentError::MissingClientSecret)
    }
}

/// MockPaymentService
///
/// Deterministic stand-in used by tests and by local runs without processor
/// credentials.
#[derive(Clone, Default)]
pub struct MockPaymentService {
    /// When true, every call is rejected as if the processor refused it.
    pub should_fail: bool,
}

impl MockPaymentService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl PaymentService for MockPaymentService {
    async fn create_payment_intent(&self, amount: i64, currency: &str) -> Result<String, PaymentError> {
        if self.should_fail {
            return Err(PaymentError::Rejected { status: 402 });
        }
        Ok(format!("pi_mock_{amount}_{currency}_secret"))
    }
}
