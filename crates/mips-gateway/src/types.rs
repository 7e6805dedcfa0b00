//! MIPS Wire Types
//!
//! Request and response bodies for the MIPS merchant API, shaped exactly as
//! the processor expects them. Amounts go over the wire as JSON numbers, so
//! `Decimal` fields use the float serde adapter at the field level.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Merchant identity bundle carried in every request body
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Authentify {
    pub id_merchant: String,
    pub id_entity: String,
    pub id_operator: String,
    pub operator_password: String,
}

/// Customer contact details forwarded to MIPS
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientDetails {
    pub first_name: String,
    pub last_name: String,
    pub client_email: String,
    pub phone_number: String,
}

impl From<&Customer> for ClientDetails {
    fn from(customer: &Customer) -> Self {
        Self {
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            client_email: customer.email.clone(),
            phone_number: customer.phone.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalancePattern {
    pub balance_number: u32,
    pub balance_mode: String,
    pub condition: String,
}

/// The `request` block of a payment request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestBlock {
    pub request_mode: String,
    pub options: String,
    pub sending_mode: String,
    pub request_title: String,
    pub exp_date: String,
    pub client_details: ClientDetails,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_amount_total: Decimal,
    pub max_amount_per_claim: u32,
    pub max_frequency: u32,
    pub max_date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub deposit_amount: Decimal,
    pub balance_pattern: Vec<BalancePattern>,
    pub client_account_number: String,
}

/// The `initial_payment` block tying the request to an order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitialPayment {
    pub id_order: String,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Full body of `POST /create_payment_request`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRequestPayload {
    pub authentify: Authentify,
    pub request: RequestBlock,
    pub initial_payment: InitialPayment,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentLink {
    pub url: String,
    pub qr_code: String,
}

/// Body of a `create_payment_request` response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRequestResponse {
    pub operation_status: String,
    #[serde(default)]
    pub operation_status_details: Option<serde_json::Value>,
    #[serde(default)]
    pub payment_link: Option<PaymentLink>,
}

/// Redirect target returned to the checkout caller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRedirect {
    pub redirect_url: String,
    pub qr_code: String,
}

/// Body of `POST /crypted_callback_url` registering the IMN endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallbackRegistration {
    pub crypted_callback: String,
}

/// Inbound IMN callback: an encrypted blob, or discrete fields on older
/// processor versions
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ImnCallback {
    Encrypted { response: String },
    Fields(CallbackFields),
}

impl ImnCallback {
    /// Which delivery format the processor used
    pub fn kind(&self) -> &'static str {
        match self {
            ImnCallback::Encrypted { .. } => "encrypted",
            ImnCallback::Fields(_) => "fields",
        }
    }
}

/// Plain-field variant of the IMN callback
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallbackFields {
    pub id_order: String,
    pub id_transaction: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
}

/// Body of `POST /decrypt_imn_data`: the raw received payload plus the
/// merchant credentials MIPS needs to decrypt it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub authentify: Authentify,
    pub salt: String,
    pub cipher_key: String,
    pub received_crypted_data: String,
}

/// Validated transaction details returned by the decrypt endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatedCallback {
    pub operation_status: String,
    pub id_order: String,
    pub id_transaction: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
}

impl ValidatedCallback {
    /// Whether MIPS confirmed the payment succeeded
    pub fn is_success(&self) -> bool {
        self.operation_status == "success"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_serialize_as_json_numbers() {
        let payment = InitialPayment {
            id_order: "SO-0042".into(),
            currency: "MUR".into(),
            amount: dec!(480.50),
        };
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["amount"], serde_json::json!(480.5));
    }

    #[test]
    fn callback_parses_encrypted_blob() {
        let raw = r#"{"response": "0a1b2c3d"}"#;
        let callback: ImnCallback = serde_json::from_str(raw).unwrap();
        assert!(matches!(callback, ImnCallback::Encrypted { response } if response == "0a1b2c3d"));
    }

    #[test]
    fn callback_parses_discrete_fields() {
        let raw = r#"{
            "id_order": "SO-0042",
            "id_transaction": "TXN-9",
            "amount": 480.0,
            "currency": "MUR",
            "status": "success"
        }"#;
        let callback: ImnCallback = serde_json::from_str(raw).unwrap();
        match callback {
            ImnCallback::Fields(fields) => {
                assert_eq!(fields.id_order, "SO-0042");
                assert_eq!(fields.amount, dec!(480));
            }
            ImnCallback::Encrypted { .. } => panic!("parsed as encrypted"),
        }
    }

    #[test]
    fn success_response_carries_payment_link() {
        let raw = r#"{
            "operation_status": "success",
            "payment_link": {"url": "https://pay.mips.mu/r/abc", "qr_code": "data:image/png;base64,xyz"}
        }"#;
        let response: PaymentRequestResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.operation_status, "success");
        assert_eq!(response.payment_link.unwrap().url, "https://pay.mips.mu/r/abc");
    }

    #[test]
    fn error_response_carries_details() {
        let raw = r#"{
            "operation_status": "error",
            "operation_status_details": {"code": 17, "reason": "amount above limit"}
        }"#;
        let response: PaymentRequestResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.operation_status, "error");
        assert!(response.payment_link.is_none());
        assert_eq!(response.operation_status_details.unwrap()["code"], 17);
    }
}
