use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::ports::{PaymentGateway, ProcessorRefund};

/// HTTP client for the payment processor's refund endpoint.
///
/// Sends `POST {base_url}/refunds` with a JSON body carrying the payment
/// reference, the amount in minor units and the idempotency key. The request
/// timeout is bounded so a stalled processor fails the operation instead of
/// hanging it. Intended to run on a blocking thread (`web::block`).
pub struct HttpPaymentGateway {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Internal(format!("could not build payment client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct RefundRequestBody<'a> {
    payment_reference: &'a str,
    amount: i64,
    idempotency_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefundResponseBody {
    id: String,
    status: String,
}

impl PaymentGateway for HttpPaymentGateway {
    fn refund(
        &self,
        payment_reference: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<ProcessorRefund, DomainError> {
        let response = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&RefundRequestBody {
                payment_reference,
                amount: amount_cents,
                idempotency_key,
            })
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DomainError::PaymentFailed("refund request timed out".into())
                } else {
                    DomainError::PaymentFailed(format!("refund request failed: {e}"))
                }
            })?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(DomainError::PaymentFailed(format!(
                "processor returned {http_status}"
            )));
        }

        let body: RefundResponseBody = response.json().map_err(|e| {
            DomainError::PaymentFailed(format!("could not decode processor response: {e}"))
        })?;

        // Anything other than a confirmed refund counts as failure.
        if body.status != "succeeded" {
            return Err(DomainError::PaymentFailed(format!(
                "refund {} reported status {}",
                body.id, body.status
            )));
        }

        Ok(ProcessorRefund {
            id: body.id,
            status: body.status,
        })
    }
}
