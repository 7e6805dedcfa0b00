//! Application State

use std::sync::Arc;

use mips_gateway::{MemoryOrderStore, MemoryPaymentStore, MipsClient, MipsSettings, Reconciler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Gateway settings, loaded once at startup
    pub settings: Arc<MipsSettings>,

    /// MIPS merchant API client
    pub client: Arc<MipsClient>,

    /// Order lookup (in-memory here; a deployment backs this with the
    /// platform's order store)
    pub orders: Arc<MemoryOrderStore>,

    /// Payment entry storage
    pub payments: Arc<MemoryPaymentStore>,

    /// IMN callback reconciler
    pub reconciler: Arc<Reconciler<MemoryOrderStore, MemoryPaymentStore>>,
}
