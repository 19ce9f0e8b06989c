//! Billing engine
//!
//! Orchestrates invoice generation and payment recording over the storage
//! ports. Exactly-once invoicing rests on the store's unique constraint on
//! the work order, not on the early lookup, so two racing callers can both
//! pass the lookup and still only one commit succeeds.

use chrono::Days;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{BillingPeriod, Clock, InvoiceId, PortError, WorkOrderId};
use domain_workorder::{mark_invoiced, WorkOrder, WorkOrderPort, WorkOrderStatus};

use crate::calculator::InvoiceCalculator;
use crate::config::BillingConfig;
use crate::contract::Contract;
use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceHeader, InvoiceStatus};
use crate::ledger::PaymentLedger;
use crate::numbering::{InvoiceNumberGenerator, InvoiceSequence};
use crate::payment::NewPayment;
use crate::ports::{BillingStore, INVOICE_NUMBER_KEY, INVOICE_WORK_ORDER_KEY};

/// Invoice generation and payment recording
#[derive(Clone)]
pub struct BillingEngine {
    work_orders: Arc<dyn WorkOrderPort>,
    store: Arc<dyn BillingStore>,
    numbers: InvoiceNumberGenerator,
    clock: Arc<dyn Clock>,
    calculator: InvoiceCalculator,
    ledger: PaymentLedger,
    config: BillingConfig,
}

impl BillingEngine {
    pub fn new(
        work_orders: Arc<dyn WorkOrderPort>,
        store: Arc<dyn BillingStore>,
        sequence: Arc<dyn InvoiceSequence>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
    ) -> Self {
        Self {
            work_orders,
            store,
            numbers: InvoiceNumberGenerator::new(sequence),
            clock,
            calculator: InvoiceCalculator::new(config.clone()),
            ledger: PaymentLedger::new(config.allow_overpayment),
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Issues the invoice for a completed work order
    ///
    /// # Errors
    ///
    /// - `NotFound` if the work order or its contract does not exist
    /// - `InvalidState` unless the work order is `COMPLETED`
    /// - `DuplicateInvoice` if the work order already has an invoice
    /// - `NumberAllocationExhausted` if every allocated number collided
    #[instrument(skip(self), fields(work_order_id = %work_order_id))]
    pub async fn generate_invoice(&self, work_order_id: WorkOrderId) -> Result<Invoice, BillingError> {
        let work_order = self.work_orders.get_work_order(work_order_id).await?;

        if self
            .store
            .find_invoice_by_work_order(work_order_id)
            .await?
            .is_some()
        {
            return Err(BillingError::DuplicateInvoice(work_order_id));
        }
        ensure_completed(&work_order)?;

        let contract = match work_order.contract_id {
            Some(contract_id) => Some(self.store.get_contract(contract_id).await?),
            None => None,
        };

        let calculation = self.calculator.calculate(&work_order, contract.as_ref())?;

        let now = self.clock.now();
        let issue_date = self.config.timezone.local_date(now);
        let period = BillingPeriod::containing(issue_date);
        let terms = contract
            .as_ref()
            .map(|c| c.payment_terms_days)
            .unwrap_or(self.config.default_payment_terms_days);
        let due_date = issue_date
            .checked_add_days(Days::new(u64::from(terms)))
            .ok_or_else(|| {
                BillingError::Calculation(format!("due date overflows {} + {} days", issue_date, terms))
            })?;

        let invoiced = mark_invoiced(work_order.clone())?;
        let attempts = self.config.max_number_allocation_attempts;

        for attempt in 1..=attempts {
            let invoice_number = self.numbers.next(period).await?;
            let invoice = Invoice::issue(
                InvoiceHeader {
                    invoice_number,
                    work_order_id,
                    client_id: work_order.client_id,
                    contract_id: contract.as_ref().map(|c: &Contract| c.id),
                    issue_date,
                    due_date,
                },
                calculation.clone(),
                now,
            );

            match self.store.commit_invoice(&invoice, &invoiced).await {
                Ok(saved) => {
                    info!(
                        invoice_id = %saved.id,
                        invoice_number = %saved.invoice_number,
                        total = %saved.total_amount,
                        due_date = %saved.due_date,
                        "invoice generated"
                    );
                    return Ok(saved);
                }
                Err(e) if e.violates(INVOICE_WORK_ORDER_KEY) => {
                    return Err(BillingError::DuplicateInvoice(work_order_id));
                }
                Err(e) if e.violates(INVOICE_NUMBER_KEY) => {
                    warn!(
                        attempt,
                        invoice_number = %invoice.invoice_number,
                        "invoice number collision, allocating another"
                    );
                }
                Err(PortError::Conflict { message }) => {
                    return Err(self.explain_commit_conflict(work_order_id, message).await);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::NumberAllocationExhausted { period, attempts })
    }

    /// Records a payment, retrying on version conflicts
    ///
    /// # Errors
    ///
    /// - `NotFound` if the invoice does not exist
    /// - `InvalidAmount` or `Overpayment` from the ledger
    /// - `ConcurrentModification` if every attempt lost a version race
    #[instrument(skip(self, payment), fields(invoice_id = %invoice_id, amount = %payment.amount))]
    pub async fn record_payment(
        &self,
        invoice_id: InvoiceId,
        payment: NewPayment,
    ) -> Result<Invoice, BillingError> {
        let attempts = self.config.max_payment_attempts;

        for attempt in 1..=attempts {
            let invoice = self.store.get_invoice(invoice_id).await?;
            let updated = self
                .ledger
                .record_payment(&invoice, &payment, self.clock.now())?;
            let recorded = match updated.payments.last() {
                Some(recorded) => recorded,
                None => {
                    return Err(BillingError::Calculation(
                        "ledger returned an invoice without the new payment".into(),
                    ))
                }
            };
            let balance_due = updated.balance_due()?;

            match self.store.append_payment(&updated, recorded).await {
                Ok(saved) => {
                    info!(
                        payment_id = %recorded.id,
                        status = %saved.status,
                        balance_due = %balance_due,
                        "payment recorded"
                    );
                    return Ok(saved);
                }
                Err(PortError::Conflict { message }) => {
                    warn!(attempt, %message, "invoice changed while recording payment, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::ConcurrentModification(format!(
            "invoice {} kept changing across {} payment attempts",
            invoice_id, attempts
        )))
    }

    /// Moves a draft invoice to `SENT`; already-sent invoices are left alone
    ///
    /// A version conflict reloads the invoice and tries again, so a payment
    /// landing between the read and the write is decided on fresh state.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn mark_invoice_sent(&self, invoice_id: InvoiceId) -> Result<(), BillingError> {
        let attempts = self.config.max_payment_attempts;

        for attempt in 1..=attempts {
            let mut invoice = self.store.get_invoice(invoice_id).await?;
            match invoice.status {
                InvoiceStatus::Sent => return Ok(()),
                InvoiceStatus::Draft => {}
                other => {
                    return Err(BillingError::InvalidState(format!(
                        "invoice {} is {}, only DRAFT invoices can be sent",
                        invoice.invoice_number, other
                    )))
                }
            }

            invoice.status = InvoiceStatus::Sent;
            invoice.updated_at = self.clock.now();
            match self.store.update_invoice_status(&invoice).await {
                Ok(_) => {
                    info!(invoice_number = %invoice.invoice_number, "invoice sent");
                    return Ok(());
                }
                Err(PortError::Conflict { message }) => {
                    warn!(attempt, %message, "invoice changed while sending, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::ConcurrentModification(format!(
            "invoice {} kept changing across {} send attempts",
            invoice_id, attempts
        )))
    }

    pub async fn get_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        Ok(self.store.get_invoice(invoice_id).await?)
    }

    pub async fn invoice_for_work_order(
        &self,
        work_order_id: WorkOrderId,
    ) -> Result<Invoice, BillingError> {
        self.store
            .find_invoice_by_work_order(work_order_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", format!("for work order {}", work_order_id)))
    }

    /// Today's date in the billing time zone
    pub fn today(&self) -> chrono::NaiveDate {
        self.config.timezone.local_date(self.clock.now())
    }

    /// Works out why the guarded work-order update failed
    async fn explain_commit_conflict(&self, work_order_id: WorkOrderId, message: String) -> BillingError {
        match self.store.find_invoice_by_work_order(work_order_id).await {
            Ok(Some(_)) => return BillingError::DuplicateInvoice(work_order_id),
            Ok(None) => {}
            Err(e) => return e.into(),
        }
        match self.work_orders.get_work_order(work_order_id).await {
            Ok(current) if current.status() != WorkOrderStatus::Completed => {
                BillingError::InvalidState(format!(
                    "work order {} changed to {} during invoicing",
                    work_order_id,
                    current.status()
                ))
            }
            Ok(_) => BillingError::ConcurrentModification(message),
            Err(e) => e.into(),
        }
    }
}

fn ensure_completed(work_order: &WorkOrder) -> Result<(), BillingError> {
    if work_order.status() != WorkOrderStatus::Completed {
        return Err(BillingError::InvalidState(format!(
            "work order {} is {}, only COMPLETED work orders can be invoiced",
            work_order.id,
            work_order.status()
        )));
    }
    Ok(())
}
