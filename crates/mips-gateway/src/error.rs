//! Gateway Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised while talking to MIPS or reconciling callbacks
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error (missing or malformed settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Currency not supported by MIPS
    #[error("MIPS does not support transactions in currency '{0}'")]
    UnsupportedCurrency(String),

    /// Non-positive or otherwise unusable request amount
    #[error("Invalid request amount: {0}")]
    InvalidAmount(rust_decimal::Decimal),

    /// MIPS answered with a non-200 status
    #[error("MIPS returned HTTP {status}")]
    Http { status: u16 },

    /// MIPS answered 200 but reported a business error
    #[error("MIPS reported an error: {details}")]
    Processor { details: serde_json::Value },

    /// IMN callback failed decryption/validation
    #[error("Callback rejected: {0}")]
    CallbackRejected(String),

    /// Repository failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transport failure reaching MIPS
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Payload (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::UnsupportedCurrency(currency) => format!(
                "Please select another payment method. MIPS does not support transactions in currency '{currency}'"
            ),
            GatewayError::InvalidAmount(_) => "The requested amount is not valid.".into(),
            GatewayError::Http { .. } | GatewayError::Network(_) => {
                "Fatal Error encountered".into()
            }
            GatewayError::Processor { details } => {
                format!("The payment could not be created: {details}")
            }
            GatewayError::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}
