//! HTTP Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mips_gateway::{CallbackOutcome, Customer, GatewayError, PaymentRedirect, PaymentStore};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: mips_gateway::Environment,
    pub callback_registered: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutParams {
    pub order_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequestBody {
    pub order_id: String,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub customer: Customer,
}

fn default_currency() -> String {
    "MUR".into()
}

#[derive(Debug, Serialize)]
pub struct PaymentRequestApiResponse {
    /// One redirect per chunk; amounts over the transaction limit split
    /// into multiple sequential requests
    pub requests: Vec<PaymentRedirect>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.settings.environment,
        callback_registered: state.settings.callback_registered,
    })
}

/// Checkout redirect page.
///
/// Builds the payment request(s) for the order and renders a page carrying
/// the redirect target and QR code, or the error message when the request
/// cannot be built. No redirect happens on failure.
pub async fn mips_checkout(
    State(state): State<AppState>,
    Query(params): Query<CheckoutParams>,
) -> Html<String> {
    let customer = Customer {
        first_name: params.first_name,
        last_name: params.last_name,
        email: params.email,
        phone: params.phone,
    };

    match state
        .client
        .request_for_payment(&params.order_id, params.amount, "MUR", &customer)
        .await
    {
        // Sequential requests each get their own link; the page sends the
        // customer to the first one.
        Ok(redirects) => match redirects.first() {
            Some(first) => {
                tracing::info!(
                    order_id = %params.order_id,
                    requests = redirects.len(),
                    "Checkout redirecting to MIPS"
                );
                Html(render_redirect(first))
            }
            None => Html(render_error("Fatal Error encountered")),
        },
        Err(e) => {
            tracing::error!(order_id = %params.order_id, error = %e, "Checkout failed");
            Html(render_error(&e.user_message()))
        }
    }
}

/// Programmatic payment request API
pub async fn create_payment_request(
    State(state): State<AppState>,
    Json(payload): Json<PaymentRequestBody>,
) -> Result<Json<PaymentRequestApiResponse>, (StatusCode, Json<ErrorResponse>)> {
    let requests = state
        .client
        .request_for_payment(
            &payload.order_id,
            payload.amount,
            &payload.currency,
            &payload.customer,
        )
        .await
        .map_err(|e| {
            tracing::error!(order_id = %payload.order_id, error = %e, "Payment request failed");
            let status = match e {
                GatewayError::UnsupportedCurrency(_) | GatewayError::InvalidAmount(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(ErrorResponse {
                    error: e.user_message(),
                    code: "PAYMENT_REQUEST_FAILED".into(),
                }),
            )
        })?;

    Ok(Json(PaymentRequestApiResponse { requests }))
}

/// Register an order so inbound callbacks can resolve it. This is the
/// platform-facing side: orders are created by the shop, never by the
/// payment flow itself.
pub async fn register_order(
    State(state): State<AppState>,
    Json(order): Json<mips_gateway::Order>,
) -> StatusCode {
    tracing::info!(order_id = %order.id, total = %order.grand_total, "Registered order");
    state.orders.insert(order);
    StatusCode::CREATED
}

#[derive(Debug, Deserialize)]
pub struct PaymentLookupParams {
    pub transaction_id: String,
}

/// Operator lookup: payment entries recorded for a processor transaction.
/// More than one entry for the same id means duplicate delivery.
pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<PaymentLookupParams>,
) -> Result<Json<Vec<mips_gateway::PaymentEntry>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .payments
        .find_by_transaction(&params.transaction_id)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.user_message(),
                    code: "PAYMENT_LOOKUP_FAILED".into(),
                }),
            )
        })
}

/// IMN callback endpoint.
///
/// Guest-allowed: MIPS calls this with no user context. Every delivery is
/// acknowledged with 200 so no internal state leaks to the unauthenticated
/// caller; failures only show up in the logs.
pub async fn imn_callback(State(state): State<AppState>, body: String) -> StatusCode {
    match state.reconciler.handle(&body).await {
        CallbackOutcome::Reconciled { entry } => {
            tracing::info!(
                order_id = %entry.order_id,
                transaction_id = %entry.transaction_id,
                "IMN callback reconciled"
            );
        }
        CallbackOutcome::Rejected { reason } => {
            tracing::warn!(reason = %reason, "IMN callback rejected");
        }
        CallbackOutcome::OrderNotFound { order_id } => {
            tracing::warn!(order_id = %order_id, "IMN callback for unknown order");
        }
    }
    StatusCode::OK
}

// ============================================================================
// Page Rendering
// ============================================================================

/// Escape a value for interpolation into HTML text or attributes. The
/// redirect URL, QR payload, and error details all originate from the
/// processor and cannot go into the page verbatim.
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_redirect(redirect: &PaymentRedirect) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta http-equiv="refresh" content="3;url={url}">
  <title>Redirecting to MIPS</title>
</head>
<body>
  <p>Redirecting you to the MIPS payment page&hellip;</p>
  <p><a href="{url}">Continue to payment</a></p>
  <img src="{qr}" alt="Scan to pay">
</body>
</html>
"#,
        url = escape_html(&redirect.redirect_url),
        qr = escape_html(&redirect.qr_code),
    )
}

fn render_error(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Payment failed</title>
</head>
<body>
  <h1>Payment could not be started</h1>
  <p>{message}</p>
</body>
</html>
"#,
        message = escape_html(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn checkout_params_parse_from_query() {
        let params: CheckoutParams =
            serde_urlencoded::from_str("order_id=SO-0042&amount=480&email=amal%40example.com")
                .unwrap();
        assert_eq!(params.order_id, "SO-0042");
        assert_eq!(params.amount, dec!(480));
        assert_eq!(params.email, "amal@example.com");
        assert!(params.phone.is_empty());
    }

    #[test]
    fn redirect_page_links_and_embeds_qr() {
        let page = render_redirect(&PaymentRedirect {
            redirect_url: "https://pay.mips.mu/r/abc".into(),
            qr_code: "data:image/png;base64,xyz".into(),
        });
        assert!(page.contains(r#"url=https://pay.mips.mu/r/abc"#));
        assert!(page.contains(r#"href="https://pay.mips.mu/r/abc""#));
        assert!(page.contains("data:image/png;base64,xyz"));
    }

    #[test]
    fn error_page_carries_message_and_no_redirect() {
        let page = render_error("Fatal Error encountered");
        assert!(page.contains("Fatal Error encountered"));
        assert!(!page.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn processor_values_are_html_escaped() {
        let page = render_error(r#"declined: <script>alert("x")</script>"#);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"));

        let page = render_redirect(&PaymentRedirect {
            redirect_url: r#"https://pay.mips.mu/r/a"><script>"#.into(),
            qr_code: "data:image/png;base64,xyz".into(),
        });
        assert!(!page.contains(r#""><script>"#));
        assert!(page.contains("&quot;&gt;&lt;script&gt;"));
    }
}
