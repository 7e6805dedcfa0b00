//! # mips-gateway
//!
//! MIPS payment gateway integration for ERP/e-commerce platforms.
//!
//! Two decoupled stages make up the flow:
//!
//! ```text
//! ┌──────────────┐  create_payment_request  ┌──────────────┐
//! │   Checkout   │─────────────────────────▶│  MIPS API    │
//! │  (builder)   │◀──── redirect + QR ──────│              │
//! └──────────────┘                          └──────┬───────┘
//!                                                  │ IMN callback
//!                                                  ▼ (async, later)
//! ┌──────────────┐   decrypt_imn_data       ┌──────────────┐
//! │  Reconciler  │─────────────────────────▶│  MIPS API    │
//! │              │◀──── validated tx ───────│              │
//! └──────┬───────┘                          └──────────────┘
//!        │ record finalized payment entry
//!        ▼
//!   OrderStore / PaymentStore
//! ```
//!
//! The builder runs synchronously during checkout; the reconciler runs
//! later, when MIPS delivers the Instant Merchant Notification to a public
//! endpoint. The order id embedded in the initial payment ties the two
//! together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mips_gateway::{MipsClient, MipsSettings, Customer};
//! use std::sync::Arc;
//!
//! let settings = Arc::new(MipsSettings::from_env()?);
//! let client = MipsClient::new(settings)?;
//!
//! // Amounts over the transaction limit split into sequential requests.
//! let redirects = client
//!     .request_for_payment("SO-0042", amount, "MUR", &customer)
//!     .await?;
//!
//! // Redirect the customer to: redirects[0].redirect_url
//! ```

mod client;
mod error;
mod reconcile;
mod session;
mod settings;
mod store;
mod types;

pub use client::{CallbackValidator, MipsClient};
pub use error::{GatewayError, Result};
pub use reconcile::{CallbackOutcome, Reconciler};
pub use session::{ElevatedGuard, SessionContext, GUEST_USER, SYSTEM_USER};
pub use settings::{Environment, MipsSettings, SUPPORTED_CURRENCIES};
pub use store::{
    MemoryOrderStore, MemoryPaymentStore, Order, OrderStore, PaymentDetail, PaymentEntry,
    PaymentStore,
};
pub use types::{
    CallbackFields, Customer, ImnCallback, PaymentRedirect, PaymentRequestPayload,
    ValidatedCallback,
};
