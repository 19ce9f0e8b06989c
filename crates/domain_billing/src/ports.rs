//! Billing Domain Ports
//!
//! `BillingStore` is the persistence seam for contracts and invoices. The
//! engine relies on adapters for three guarantees:
//!
//! - `invoices.work_order_id` is unique (`INVOICE_WORK_ORDER_KEY`)
//! - `invoices.invoice_number` is unique (`INVOICE_NUMBER_KEY`)
//! - `commit_invoice` writes the invoice, its lines and the work order's
//!   `INVOICED` status in one transaction, or nothing at all
//!
//! Unique violations are reported as `PortError::UniqueViolation` carrying the
//! constraint name; guarded writes that find the wrong version or status
//! report `PortError::Conflict`.

use async_trait::async_trait;

use core_kernel::{ContractId, DomainPort, InvoiceId, PortError, WorkOrderId};
use domain_workorder::WorkOrder;

use crate::contract::Contract;
use crate::invoice::Invoice;
use crate::payment::Payment;

/// Unique constraint on `invoices.work_order_id`
pub const INVOICE_WORK_ORDER_KEY: &str = "invoices_work_order_id_key";

/// Unique constraint on `invoices.invoice_number`
pub const INVOICE_NUMBER_KEY: &str = "invoices_invoice_number_key";

/// Storage operations for contracts and invoices
#[async_trait]
pub trait BillingStore: DomainPort {
    async fn get_contract(&self, id: ContractId) -> Result<Contract, PortError>;

    /// Loads an invoice with its line items and payments
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    async fn find_invoice_by_work_order(
        &self,
        work_order_id: WorkOrderId,
    ) -> Result<Option<Invoice>, PortError>;

    /// Inserts `invoice` and moves the work order to `INVOICED` atomically
    ///
    /// `work_order` is the output of `mark_invoiced`; the update succeeds only
    /// if the stored row is still `COMPLETED` at `work_order.version()`.
    async fn commit_invoice(
        &self,
        invoice: &Invoice,
        work_order: &WorkOrder,
    ) -> Result<Invoice, PortError>;

    /// Appends `payment` and stores `invoice.status`
    ///
    /// Guarded on the stored version equalling `invoice.version`; returns the
    /// stored invoice with its version advanced.
    async fn append_payment(&self, invoice: &Invoice, payment: &Payment)
        -> Result<Invoice, PortError>;

    /// Stores `invoice.status`, guarded on `invoice.version`
    async fn update_invoice_status(&self, invoice: &Invoice) -> Result<Invoice, PortError>;
}
