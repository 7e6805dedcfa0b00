//! Order and Payment Repositories
//!
//! The reconciler never touches a concrete store: orders and payment
//! entries live behind narrow traits, with in-memory implementations for
//! development and tests. A real deployment backs these with whatever the
//! surrounding platform persists orders in.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GatewayError, Result};

/// A sales order awaiting payment. External entity: looked up by id, never
/// created here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Counterparty the payment is attributed to
    pub customer: String,
    pub grand_total: Decimal,
    pub currency: String,
}

/// Transaction details extracted from a validated callback
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentDetail {
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
}

/// A finalized payment entry against an order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub id: Uuid,
    pub order_id: String,
    pub party: String,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_id: String,
    /// Submitted, not draft: the write is final once recorded
    pub submitted: bool,
    pub created_at: DateTime<Utc>,
}

/// Order lookup trait
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Find an order by its reference id
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>>;
}

/// Payment entry storage trait
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Create and durably commit a finalized payment entry. Attribution and
    /// the submitted flag are the store's responsibility; the entry must be
    /// durable before this returns.
    async fn record_payment(&self, order: &Order, detail: &PaymentDetail)
        -> Result<PaymentEntry>;

    /// Entries already recorded for a processor transaction id. Used to
    /// flag duplicate delivery; nothing currently deduplicates on it.
    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Vec<PaymentEntry>>;
}

/// In-memory order store (for development and tests)
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.orders.write().unwrap().insert(order.id.clone(), order);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_order(&self, order_id: &str) -> Result<Option<Order>> {
        let orders = self
            .orders
            .read()
            .map_err(|_| GatewayError::Storage("order store lock poisoned".into()))?;
        Ok(orders.get(order_id).cloned())
    }
}

/// In-memory payment store (for development and tests)
#[derive(Default)]
pub struct MemoryPaymentStore {
    entries: RwLock<Vec<PaymentEntry>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries, oldest first
    pub fn entries(&self) -> Vec<PaymentEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn record_payment(
        &self,
        order: &Order,
        detail: &PaymentDetail,
    ) -> Result<PaymentEntry> {
        let entry = PaymentEntry {
            id: Uuid::new_v4(),
            order_id: order.id.clone(),
            party: order.customer.clone(),
            amount: detail.amount,
            currency: detail.currency.clone(),
            transaction_id: detail.transaction_id.clone(),
            submitted: true,
            created_at: Utc::now(),
        };
        self.entries
            .write()
            .map_err(|_| GatewayError::Storage("payment store lock poisoned".into()))?
            .push(entry.clone());
        Ok(entry)
    }

    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Vec<PaymentEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GatewayError::Storage("payment store lock poisoned".into()))?;
        Ok(entries
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order {
            id: "SO-0042".into(),
            customer: "Amal Peerun".into(),
            grand_total: dec!(480),
            currency: "MUR".into(),
        }
    }

    #[tokio::test]
    async fn missing_order_is_none() {
        let store = MemoryOrderStore::new();
        assert!(store.find_order("SO-0042").await.unwrap().is_none());
        store.insert(order());
        assert!(store.find_order("SO-0042").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recorded_payment_is_submitted_and_attributed() {
        let store = MemoryPaymentStore::new();
        let entry = store
            .record_payment(
                &order(),
                &PaymentDetail {
                    transaction_id: "TXN-9".into(),
                    amount: dec!(480),
                    currency: "MUR".into(),
                },
            )
            .await
            .unwrap();

        assert!(entry.submitted);
        assert_eq!(entry.party, "Amal Peerun");
        assert_eq!(entry.order_id, "SO-0042");
        assert_eq!(store.find_by_transaction("TXN-9").await.unwrap().len(), 1);
        assert!(store.find_by_transaction("TXN-0").await.unwrap().is_empty());
    }
}
