//! Payment processor client.
//!
//! The ledger only needs the processor for the authoritative `Completed`
//! transition and for payouts. Secret-key operations live on a backend;
//! [`HttpPaymentProcessor`] talks to that backend. [`SimulatedProcessor`]
//! stands in when no backend is configured.

use std::time::Duration;

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from payment processor calls. Never retried automatically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessorError {
    #[error("Payment processor network error: {message}")]
    Network { message: String },

    #[error("Payment processor rejected the request: {message}")]
    Rejected { message: String },

    #[error("Payment processor response format error: {message}")]
    Format { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    /// Minor currency units (cents)
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub payout_id: String,
    pub amount: f64,
    pub destination: String,
}

/// Card summary attached to a saved payment method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: i32,
}

/// A payment method saved for a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub card: Option<CardSummary>,
}

/// Intent status that settles a transaction.
pub const INTENT_SUCCEEDED: &str = "succeeded";

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == INTENT_SUCCEEDED
    }
}

/// Convert a major-unit amount to minor units, rounding to the nearest cent.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[async_trait]
pub trait PaymentProcessor {
    /// Create (and confirm) a payment intent for `amount` major units.
    async fn create_intent(&self, amount: f64, currency: &str) -> Result<PaymentIntent, ProcessorError>;

    /// Pay `amount` out to `destination`.
    async fn process_payout(&self, amount: f64, destination: &str) -> Result<Payout, ProcessorError>;

    /// Payment methods saved for `customer_id`.
    async fn payment_methods(&self, customer_id: &str) -> Result<Vec<PaymentMethod>, ProcessorError>;

    /// Get the name of this processor for logging/debugging
    fn processor_name(&self) -> &str;
}

fn random_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(13)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{}_{}", prefix, suffix)
}

/// In-process processor with a fixed latency and optional forced failure
#[derive(Debug, Clone)]
pub struct SimulatedProcessor {
    delay: Duration,
    failure: Option<String>,
}

impl SimulatedProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failure: None,
        }
    }

    /// No latency.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Rejects every call with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            failure: Some(message.into()),
        }
    }

    async fn simulate(&self) -> Result<(), ProcessorError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(ProcessorError::Rejected {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for SimulatedProcessor {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    async fn create_intent(&self, amount: f64, currency: &str) -> Result<PaymentIntent, ProcessorError> {
        self.simulate().await?;
        let id = random_id("pi");
        let client_secret = format!("{}_secret_{}", id, random_id("cs"));
        tracing::debug!("Simulated payment intent {} for {:.2} {}", id, amount, currency);
        Ok(PaymentIntent {
            id,
            amount: to_minor_units(amount),
            currency: currency.to_string(),
            status: INTENT_SUCCEEDED.to_string(),
            client_secret: Some(client_secret),
        })
    }

    async fn process_payout(&self, amount: f64, destination: &str) -> Result<Payout, ProcessorError> {
        self.simulate().await?;
        Ok(Payout {
            payout_id: random_id("po"),
            amount,
            destination: destination.to_string(),
        })
    }

    async fn payment_methods(&self, customer_id: &str) -> Result<Vec<PaymentMethod>, ProcessorError> {
        self.simulate().await?;
        tracing::debug!("Simulated payment methods for {}", customer_id);
        Ok(vec![PaymentMethod {
            id: "pm_1234567890".to_string(),
            kind: "card".to_string(),
            card: Some(CardSummary {
                brand: "visa".to_string(),
                last4: "4242".to_string(),
                exp_month: 12,
                exp_year: 2030,
            }),
        }])
    }

    fn processor_name(&self) -> &str {
        "simulated"
    }
}

/// Client for the payments backend
#[derive(Clone)]
pub struct HttpPaymentProcessor {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

#[derive(Debug, Serialize)]
struct IntentRequest<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Serialize)]
struct PayoutRequest<'a> {
    amount: f64,
    destination: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayoutResponse {
    success: bool,
    #[serde(default)]
    payout_id: String,
    error: Option<String>,
}

impl HttpPaymentProcessor {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ProcessorError>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.http.post(&url).json(body)).await
    }

    async fn get<R>(&self, path: &str) -> Result<R, ProcessorError>
    where
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.http.get(&url)).await
    }

    async fn send<R>(&self, mut request: RequestBuilder) -> Result<R, ProcessorError>
    where
        R: for<'de> Deserialize<'de>,
    {
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ProcessorError::Network {
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProcessorError::Rejected {
                message: format!("payments backend returned HTTP {}", response.status()),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|err| ProcessorError::Format {
                message: err.to_string(),
            })
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    async fn create_intent(&self, amount: f64, currency: &str) -> Result<PaymentIntent, ProcessorError> {
        let body = IntentRequest {
            amount: to_minor_units(amount),
            currency,
        };
        self.post("/payment_intents", &body).await
    }

    async fn process_payout(&self, amount: f64, destination: &str) -> Result<Payout, ProcessorError> {
        let body = PayoutRequest { amount, destination };
        let response: PayoutResponse = self.post("/payouts", &body).await?;

        if !response.success {
            return Err(ProcessorError::Rejected {
                message: response.error.unwrap_or_else(|| "Payout failed".to_string()),
            });
        }

        Ok(Payout {
            payout_id: response.payout_id,
            amount,
            destination: destination.to_string(),
        })
    }

    async fn payment_methods(&self, customer_id: &str) -> Result<Vec<PaymentMethod>, ProcessorError> {
        self.get(&format!("/customers/{}/payment_methods", customer_id))
            .await
    }

    fn processor_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_round_to_nearest_cent() {
        assert_eq!(to_minor_units(0.83), 83);
        assert_eq!(to_minor_units(10.0), 1000);
        assert_eq!(to_minor_units(0.125), 13);
    }

    #[tokio::test]
    async fn simulated_intent_has_prefixed_ids() {
        let intent = SimulatedProcessor::instant()
            .create_intent(1.5, "USD")
            .await
            .unwrap();
        assert!(intent.id.starts_with("pi_"));
        assert_eq!(intent.id.len(), 16);
        assert_eq!(intent.amount, 150);
        assert!(intent.client_secret.unwrap().contains("_secret_"));
    }

    #[tokio::test]
    async fn simulated_methods_include_a_card() {
        let methods = SimulatedProcessor::instant()
            .payment_methods("cus_1")
            .await
            .unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].card.as_ref().unwrap().brand, "visa");
    }

    #[tokio::test]
    async fn failing_processor_rejects() {
        let err = SimulatedProcessor::failing("card declined")
            .process_payout(20.0, "card_4242")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProcessorError::Rejected {
                message: "card declined".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_latency_is_applied() {
        let processor = SimulatedProcessor::new(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        processor.process_payout(10.0, "card").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
