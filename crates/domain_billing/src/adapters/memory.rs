//! In-memory billing store
//!
//! All state sits behind a single `RwLock`, so each port call is atomic in the
//! same way a database transaction would be: `commit_invoice` checks both
//! unique keys and the work-order guard before writing anything.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use core_kernel::{
    AdapterHealth, BillingPeriod, ContractId, DomainPort, HealthCheckResult, HealthCheckable,
    InvoiceId, PortError, WorkOrderId,
};
use domain_workorder::{WorkOrder, WorkOrderPort, WorkOrderStatus};

use crate::contract::Contract;
use crate::invoice::Invoice;
use crate::numbering::InvoiceSequence;
use crate::payment::Payment;
use crate::ports::{BillingStore, INVOICE_NUMBER_KEY, INVOICE_WORK_ORDER_KEY};

#[derive(Debug, Default)]
struct State {
    work_orders: HashMap<WorkOrderId, WorkOrder>,
    contracts: HashMap<ContractId, Contract>,
    invoices: HashMap<InvoiceId, Invoice>,
    invoice_by_work_order: HashMap<WorkOrderId, InvoiceId>,
    invoice_by_number: HashMap<String, InvoiceId>,
    sequences: HashMap<BillingPeriod, u32>,
}

/// In-memory implementation of every billing port
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces a contract
    pub async fn insert_contract(&self, contract: Contract) {
        self.state.write().await.contracts.insert(contract.id, contract);
    }

    /// Sets the last value handed out for `period`
    pub async fn set_sequence(&self, period: BillingPeriod, last_value: u32) {
        self.state.write().await.sequences.insert(period, last_value);
    }

    pub async fn invoice_count(&self) -> usize {
        self.state.read().await.invoices.len()
    }
}

impl DomainPort for MemoryStore {}

#[async_trait]
impl WorkOrderPort for MemoryStore {
    async fn create_work_order(&self, work_order: &WorkOrder) -> Result<WorkOrder, PortError> {
        let mut state = self.state.write().await;
        if state.work_orders.contains_key(&work_order.id) {
            return Err(PortError::unique_violation(
                "work_orders_pkey",
                format!("work order {} already exists", work_order.id),
            ));
        }
        state.work_orders.insert(work_order.id, work_order.clone());
        Ok(work_order.clone())
    }

    async fn get_work_order(&self, id: WorkOrderId) -> Result<WorkOrder, PortError> {
        self.state
            .read()
            .await
            .work_orders
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("WorkOrder", id))
    }

    async fn save_work_order(&self, work_order: &WorkOrder) -> Result<WorkOrder, PortError> {
        if work_order.status() == WorkOrderStatus::Invoiced {
            return Err(PortError::validation_field(
                "INVOICED can only be set by invoice generation",
                "status",
            ));
        }
        let mut state = self.state.write().await;
        let stored = state
            .work_orders
            .get(&work_order.id)
            .ok_or_else(|| PortError::not_found("WorkOrder", work_order.id))?;
        if stored.version() != work_order.version() {
            return Err(PortError::conflict(format!(
                "work order {} is at version {}, expected {}",
                work_order.id,
                stored.version(),
                work_order.version()
            )));
        }
        let saved = work_order
            .clone()
            .with_stored_version(work_order.version() + 1);
        state.work_orders.insert(saved.id, saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn get_contract(&self, id: ContractId) -> Result<Contract, PortError> {
        self.state
            .read()
            .await
            .contracts
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Contract", id))
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        self.state
            .read()
            .await
            .invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Invoice", id))
    }

    async fn find_invoice_by_work_order(
        &self,
        work_order_id: WorkOrderId,
    ) -> Result<Option<Invoice>, PortError> {
        let state = self.state.read().await;
        Ok(state
            .invoice_by_work_order
            .get(&work_order_id)
            .and_then(|id| state.invoices.get(id))
            .cloned())
    }

    async fn commit_invoice(
        &self,
        invoice: &Invoice,
        work_order: &WorkOrder,
    ) -> Result<Invoice, PortError> {
        if work_order.status() != WorkOrderStatus::Invoiced {
            return Err(PortError::validation_field(
                "work order must come from mark_invoiced",
                "status",
            ));
        }

        let mut state = self.state.write().await;

        if state.invoice_by_work_order.contains_key(&invoice.work_order_id) {
            return Err(PortError::unique_violation(
                INVOICE_WORK_ORDER_KEY,
                format!("work order {} already has an invoice", invoice.work_order_id),
            ));
        }
        if state.invoice_by_number.contains_key(&invoice.invoice_number) {
            return Err(PortError::unique_violation(
                INVOICE_NUMBER_KEY,
                format!("invoice number {} is taken", invoice.invoice_number),
            ));
        }

        let stored = state
            .work_orders
            .get(&work_order.id)
            .ok_or_else(|| PortError::not_found("WorkOrder", work_order.id))?;
        if stored.status() != WorkOrderStatus::Completed || stored.version() != work_order.version()
        {
            return Err(PortError::conflict(format!(
                "work order {} is {} at version {}, expected COMPLETED at version {}",
                work_order.id,
                stored.status(),
                stored.version(),
                work_order.version()
            )));
        }

        let invoiced = work_order
            .clone()
            .with_stored_version(work_order.version() + 1);
        state.work_orders.insert(invoiced.id, invoiced);
        state
            .invoice_by_work_order
            .insert(invoice.work_order_id, invoice.id);
        state
            .invoice_by_number
            .insert(invoice.invoice_number.clone(), invoice.id);
        state.invoices.insert(invoice.id, invoice.clone());

        Ok(invoice.clone())
    }

    async fn append_payment(
        &self,
        invoice: &Invoice,
        payment: &Payment,
    ) -> Result<Invoice, PortError> {
        let mut state = self.state.write().await;
        let stored = state
            .invoices
            .get_mut(&invoice.id)
            .ok_or_else(|| PortError::not_found("Invoice", invoice.id))?;
        if stored.version != invoice.version {
            return Err(PortError::conflict(format!(
                "invoice {} is at version {}, expected {}",
                invoice.id, stored.version, invoice.version
            )));
        }
        stored.payments.push(payment.clone());
        stored.status = invoice.status;
        stored.updated_at = invoice.updated_at;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn update_invoice_status(&self, invoice: &Invoice) -> Result<Invoice, PortError> {
        let mut state = self.state.write().await;
        let stored = state
            .invoices
            .get_mut(&invoice.id)
            .ok_or_else(|| PortError::not_found("Invoice", invoice.id))?;
        if stored.version != invoice.version {
            return Err(PortError::conflict(format!(
                "invoice {} is at version {}, expected {}",
                invoice.id, stored.version, invoice.version
            )));
        }
        stored.status = invoice.status;
        stored.updated_at = invoice.updated_at;
        stored.version += 1;
        Ok(stored.clone())
    }
}

#[async_trait]
impl InvoiceSequence for MemoryStore {
    async fn next_value(&self, period: BillingPeriod) -> Result<u32, PortError> {
        let mut state = self.state.write().await;
        let value = state.sequences.entry(period).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[async_trait]
impl HealthCheckable for MemoryStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let invoices = self.state.read().await.invoices.len();
        HealthCheckResult {
            adapter_id: "memory-billing-store".to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: start.elapsed().as_millis() as u64,
            message: Some(format!("{} invoices in memory", invoices)),
            checked_at: Utc::now(),
        }
    }
}
