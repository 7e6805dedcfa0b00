//! Gateway Settings
//!
//! Merchant identity, API credentials, and per-transaction limits for the
//! MIPS integration. Loaded once from the environment and shared read-only
//! across every request and callback.

use reqwest::Url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Currencies MIPS can settle
pub const SUPPORTED_CURRENCIES: &[&str] = &["MUR"];

/// Which MIPS deployment to talk to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    /// Base URL of the merchant API for this environment
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Sandbox => "https://stoplight.io/mocks/mips/merchant-api/36020489",
            Environment::Production => "https://api.mips.mu/api",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" | "live" => Environment::Production,
            _ => Environment::Sandbox,
        }
    }
}

/// MIPS gateway settings
#[derive(Clone, Debug)]
pub struct MipsSettings {
    /// Merchant identity bundle sent in every request body
    pub merchant_id: String,
    pub entity_id: String,
    pub operator_id: String,
    pub operator_password: String,

    /// Shared secret used by MIPS when decrypting IMN payloads
    pub hash_salt: String,
    pub cipher_key: String,

    /// HTTP basic auth credentials for the merchant API
    pub username: String,
    pub password: String,

    /// Sandbox or production deployment
    pub environment: Environment,

    /// Maximum amount MIPS accepts per payment request
    pub transaction_limit: Decimal,

    /// Set once the IMN callback URL has been registered with MIPS
    pub callback_registered: bool,

    /// Public address of this deployment, scheme://host (port discarded)
    pub site_address: String,

    /// Title shown to the customer on the MIPS payment page
    pub request_title: String,
}

impl MipsSettings {
    /// Load settings from `MIPS_*` environment variables
    pub fn from_env() -> Result<Self> {
        fn var(name: &str) -> Result<String> {
            std::env::var(name).map_err(|_| GatewayError::Config(format!("{name} not set")))
        }

        let transaction_limit = var("MIPS_TRANSACTION_LIMIT")?
            .parse::<Decimal>()
            .map_err(|e| GatewayError::Config(format!("MIPS_TRANSACTION_LIMIT: {e}")))?;

        let environment = Environment::from_str(
            &std::env::var("MIPS_ENVIRONMENT").unwrap_or_else(|_| "sandbox".into()),
        );

        let site_address = parse_site_address(&var("MIPS_SITE_ADDRESS")?)?;

        Ok(Self {
            merchant_id: var("MIPS_MERCHANT_ID")?,
            entity_id: var("MIPS_ENTITY_ID")?,
            operator_id: var("MIPS_OPERATOR_ID")?,
            operator_password: var("MIPS_OPERATOR_PASSWORD")?,
            hash_salt: var("MIPS_HASH_SALT")?,
            cipher_key: var("MIPS_CIPHER_KEY")?,
            username: var("MIPS_USERNAME")?,
            password: var("MIPS_PASSWORD")?,
            environment,
            transaction_limit,
            callback_registered: std::env::var("MIPS_CALLBACK_REGISTERED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            site_address,
            request_title: std::env::var("MIPS_REQUEST_TITLE")
                .unwrap_or_else(|_| "Your Purchase".into()),
        })
    }

    /// Base URL of the merchant API, selected by the environment flag
    pub fn base_url(&self) -> &'static str {
        self.environment.base_url()
    }

    /// Reject currencies MIPS cannot settle, before any network call
    pub fn validate_transaction_currency(&self, currency: &str) -> Result<()> {
        if SUPPORTED_CURRENCIES.contains(&currency) {
            Ok(())
        } else {
            Err(GatewayError::UnsupportedCurrency(currency.to_string()))
        }
    }

    /// URL of the local checkout page for an order
    pub fn payment_url(&self, order_id: &str, amount: Decimal) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/mips_checkout", self.site_address),
            &[("order_id", order_id), ("amount", &amount.to_string())],
        )
        .map_err(|e| GatewayError::Config(format!("bad site address: {e}")))?;
        Ok(url.to_string())
    }

    /// Public URL MIPS should deliver IMN callbacks to
    pub fn callback_url(&self) -> String {
        format!("{}/imn_callback", self.site_address)
    }

    /// Split an amount into per-request chunks under the transaction limit.
    ///
    /// Amounts at or under the limit yield a single chunk. Larger amounts
    /// yield limit-sized chunks with the remainder last, summing exactly to
    /// the input: limit 150, amount 480 gives [150, 150, 150, 30].
    pub fn split_request_amount(&self, amount: Decimal) -> Result<Vec<Decimal>> {
        if amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount(amount));
        }

        let mut chunks = Vec::new();
        let mut remaining = amount;
        while remaining > self.transaction_limit {
            chunks.push(self.transaction_limit);
            remaining -= self.transaction_limit;
        }
        chunks.push(remaining);
        Ok(chunks)
    }
}

/// Normalize a site address to scheme://host, discarding any port
fn parse_site_address(address: &str) -> Result<String> {
    let url =
        Url::parse(address).map_err(|e| GatewayError::Config(format!("bad site address: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| GatewayError::Config(format!("site address has no host: {address}")))?;
    Ok(format!("{}://{}", url.scheme(), host))
}
