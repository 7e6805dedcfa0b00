//! MIPS Merchant API Client
//!
//! Builds and sends the outbound calls this integration makes: registering
//! the IMN callback URL, creating payment requests, and validating inbound
//! callbacks via the processor's decrypt endpoint. Every call is a blocking
//! (awaited) HTTPS POST with basic auth and the merchant identity bundle in
//! the body; there is no retry policy, a failed call surfaces immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{GatewayError, Result};
use crate::settings::MipsSettings;
use crate::types::{
    Authentify, BalancePattern, CallbackRegistration, Customer, DecryptRequest, InitialPayment,
    PaymentRedirect, PaymentRequestPayload, PaymentRequestResponse, RequestBlock,
    ValidatedCallback,
};

/// Bound on the processor's decrypt/validate call
const DECRYPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Validates a raw IMN payload against the processor.
///
/// The reconciler depends on this seam rather than on the concrete client,
/// so callback handling is testable without a live MIPS deployment.
#[async_trait]
pub trait CallbackValidator: Send + Sync {
    /// Submit the raw received payload for decryption/validation
    async fn validate_callback(&self, raw: &str) -> Result<ValidatedCallback>;
}

/// MIPS client wrapper
pub struct MipsClient {
    http: reqwest::Client,
    settings: Arc<MipsSettings>,
}

impl MipsClient {
    /// Create a new client over shared settings
    pub fn new(settings: Arc<MipsSettings>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("mips-gateway")
            .build()?;
        Ok(Self { http, settings })
    }

    /// Settings this client was built with
    pub fn settings(&self) -> &MipsSettings {
        &self.settings
    }

    fn authentify(&self) -> Authentify {
        Authentify {
            id_merchant: self.settings.merchant_id.clone(),
            id_entity: self.settings.entity_id.clone(),
            id_operator: self.settings.operator_id.clone(),
            operator_password: self.settings.operator_password.clone(),
        }
    }

    /// Register the public IMN callback URL with MIPS.
    ///
    /// On success the caller is expected to persist `callback_registered`.
    pub async fn register_imn_callback(&self) -> Result<()> {
        let payload = CallbackRegistration {
            crypted_callback: self.settings.callback_url(),
        };

        let response = self
            .http
            .post(format!("{}/IMN_CALLBACK_ARCH", self.settings.base_url()))
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
            });
        }

        tracing::info!(url = %payload.crypted_callback, "Registered IMN callback with MIPS");
        Ok(())
    }

    /// Build the full payment request body for one chunk of an order
    pub fn payment_request_payload(
        &self,
        order_id: &str,
        amount: Decimal,
        customer: &Customer,
    ) -> PaymentRequestPayload {
        let expiry = (Utc::now() + chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();

        PaymentRequestPayload {
            authentify: self.authentify(),
            request: RequestBlock {
                request_mode: "simple".into(),
                options: "warranty".into(),
                sending_mode: "mail".into(),
                request_title: self.settings.request_title.clone(),
                exp_date: expiry.clone(),
                client_details: customer.into(),
                max_amount_total: amount,
                max_amount_per_claim: 0,
                max_frequency: 0,
                max_date: expiry.clone(),
                deposit_amount: amount,
                balance_pattern: vec![BalancePattern {
                    balance_number: 1,
                    balance_mode: "auto".into(),
                    condition: format!("\"Upon request\" or {expiry}"),
                }],
                client_account_number: "string".into(),
            },
            initial_payment: InitialPayment {
                id_order: order_id.to_string(),
                currency: "MUR".into(),
                amount,
            },
        }
    }

    /// Create one payment request and return the redirect target.
    ///
    /// The amount must already be at or under the transaction limit; callers
    /// with larger amounts go through [`request_for_payment`].
    ///
    /// [`request_for_payment`]: MipsClient::request_for_payment
    pub async fn create_payment_request(
        &self,
        order_id: &str,
        amount: Decimal,
        customer: &Customer,
    ) -> Result<PaymentRedirect> {
        let payload = self.payment_request_payload(order_id, amount, customer);

        let response = self
            .http
            .post(format!("{}/create_payment_request", self.settings.base_url()))
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(order_id, status = status.as_u16(), "MIPS payment request failed");
            return Err(GatewayError::Http {
                status: status.as_u16(),
            });
        }

        let body: PaymentRequestResponse = response.json().await?;
        into_redirect(body)
    }

    /// Create payment requests for an order, splitting the amount per the
    /// transaction limit and issuing one request per chunk, sequentially.
    pub async fn request_for_payment(
        &self,
        order_id: &str,
        amount: Decimal,
        currency: &str,
        customer: &Customer,
    ) -> Result<Vec<PaymentRedirect>> {
        self.settings.validate_transaction_currency(currency)?;
        let chunks = self.settings.split_request_amount(amount)?;

        let mut redirects = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::info!(
                order_id,
                request = i + 1,
                total = chunks.len(),
                amount = %chunk,
                "Creating MIPS payment request"
            );
            redirects.push(self.create_payment_request(order_id, *chunk, customer).await?);
        }
        Ok(redirects)
    }
}

#[async_trait]
impl CallbackValidator for MipsClient {
    async fn validate_callback(&self, raw: &str) -> Result<ValidatedCallback> {
        let payload = DecryptRequest {
            authentify: self.authentify(),
            salt: self.settings.hash_salt.clone(),
            cipher_key: self.settings.cipher_key.clone(),
            received_crypted_data: raw.to_string(),
        };

        let response = self
            .http
            .post(format!("{}/decrypt_imn_data", self.settings.base_url()))
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .timeout(DECRYPT_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::CallbackRejected(format!("decrypt call failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::CallbackRejected(format!(
                "decrypt endpoint returned HTTP {status}"
            )));
        }

        let validated: ValidatedCallback = response
            .json()
            .await
            .map_err(|e| GatewayError::CallbackRejected(format!("bad decrypt response: {e}")))?;

        if !validated.is_success() {
            return Err(GatewayError::CallbackRejected(format!(
                "processor reported status '{}'",
                validated.operation_status
            )));
        }

        Ok(validated)
    }
}

/// Map a processor response onto a redirect target or an error
fn into_redirect(response: PaymentRequestResponse) -> Result<PaymentRedirect> {
    if response.operation_status == "success" {
        let link = response.payment_link.ok_or_else(|| GatewayError::Processor {
            details: serde_json::json!("success response without payment_link"),
        })?;
        Ok(PaymentRedirect {
            redirect_url: link.url,
            qr_code: link.qr_code,
        })
    } else {
        Err(GatewayError::Processor {
            details: response
                .operation_status_details
                .unwrap_or_else(|| serde_json::Value::String(response.operation_status)),
        })
    }
}
