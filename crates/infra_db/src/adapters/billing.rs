//! PostgreSQL Billing Adapter
//!
//! `PostgresBillingAdapter` implements every storage port the billing engine
//! needs (`WorkOrderPort`, `BillingStore`, `InvoiceSequence`) over one pool,
//! translating between domain values and the repository row types.
//!
//! Guarded writes that touch zero rows are reported as `PortError::Conflict`
//! when the row exists and `PortError::NotFound` when it does not.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{adapters::PostgresBillingAdapter, create_pool_from_url, run_migrations};
//!
//! let pool = create_pool_from_url("postgres://localhost/billing").await?;
//! run_migrations(&pool).await?;
//! let adapter = Arc::new(PostgresBillingAdapter::new(pool));
//! let engine = BillingEngine::new(adapter.clone(), adapter.clone(), adapter, clock, config);
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, BillingPeriod, ContractId, Currency, DomainPort, HealthCheckResult,
    HealthCheckable, InvoiceId, Money, Percentage, PortError, WorkOrderId,
};
use domain_billing::{
    BillingStore, Contract, ContractRate, Invoice, InvoiceLineItem, InvoiceSequence,
    InvoiceStatus, LineItemKind, Payment, PaymentMethod, RateMultipliers, SlaThresholds,
};
use domain_workorder::{
    MaterialUsage, Priority, ServiceCategory, TimeEntry, WorkOrder, WorkOrderPort, WorkOrderStatus,
};

use crate::error::DatabaseError;
use crate::repositories::billing::{
    ContractRateRow, ContractRow, InvoiceRecord, InvoiceRow, InvoiceStatusChange, LineItemRow,
    PaymentRow,
};
use crate::repositories::work_order::{
    MaterialUsageRow, TimeEntryRow, WorkOrderRecord, WorkOrderRow,
};
use crate::repositories::{BillingRepository, WorkOrderRepository};

const ADAPTER_ID: &str = "postgres-billing-adapter";

/// PostgreSQL-backed implementation of the billing storage ports
#[derive(Debug, Clone)]
pub struct PostgresBillingAdapter {
    work_orders: WorkOrderRepository,
    billing: BillingRepository,
    pool: PgPool,
}

impl PostgresBillingAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            work_orders: WorkOrderRepository::new(pool.clone()),
            billing: BillingRepository::new(pool.clone()),
            pool,
        }
    }

    /// Stores a contract with its rate table
    ///
    /// Contracts are maintained outside the billing flow; this is the seeding
    /// entry point.
    #[instrument(skip(self, contract), fields(contract_id = %contract.id))]
    pub async fn insert_contract(&self, contract: &Contract) -> Result<(), PortError> {
        let (row, rates) = contract_to_rows(contract)?;
        self.billing.insert_contract(&row, &rates).await?;
        debug!(rates = contract.rates.len(), "contract stored");
        Ok(())
    }
}

impl DomainPort for PostgresBillingAdapter {}

#[async_trait]
impl HealthCheckable for PostgresBillingAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl WorkOrderPort for PostgresBillingAdapter {
    #[instrument(skip(self, work_order), fields(work_order_id = %work_order.id))]
    async fn create_work_order(&self, work_order: &WorkOrder) -> Result<WorkOrder, PortError> {
        self.work_orders
            .insert(&work_order_to_record(work_order)?)
            .await?;
        Ok(work_order.clone())
    }

    #[instrument(skip(self), fields(work_order_id = %id))]
    async fn get_work_order(&self, id: WorkOrderId) -> Result<WorkOrder, PortError> {
        debug!("Fetching work order");
        let record = self
            .work_orders
            .find_by_id(id.into())
            .await?
            .ok_or_else(|| PortError::not_found("WorkOrder", id))?;
        Ok(work_order_from_record(record)?)
    }

    #[instrument(skip(self, work_order), fields(work_order_id = %work_order.id, version = work_order.version()))]
    async fn save_work_order(&self, work_order: &WorkOrder) -> Result<WorkOrder, PortError> {
        if work_order.status() == WorkOrderStatus::Invoiced {
            return Err(PortError::validation_field(
                "INVOICED can only be set by invoice generation",
                "status",
            ));
        }

        let saved = work_order
            .clone()
            .with_stored_version(work_order.version() + 1);
        let mut record = work_order_to_record(&saved)?;
        record.header.updated_at = Utc::now();

        let expected = to_db_version(work_order.version())?;
        if self.work_orders.update_guarded(&record, expected).await? {
            return Ok(saved);
        }

        match self.work_orders.version_of(work_order.id.into()).await? {
            None => Err(PortError::not_found("WorkOrder", work_order.id)),
            Some(stored) => {
                warn!(stored, "stale work order write rejected");
                Err(PortError::conflict(format!(
                    "work order {} is at version {} or already invoiced, expected version {}",
                    work_order.id,
                    stored,
                    work_order.version()
                )))
            }
        }
    }
}

#[async_trait]
impl BillingStore for PostgresBillingAdapter {
    #[instrument(skip(self), fields(contract_id = %id))]
    async fn get_contract(&self, id: ContractId) -> Result<Contract, PortError> {
        let (row, rates) = self
            .billing
            .find_contract(id.into())
            .await?
            .ok_or_else(|| PortError::not_found("Contract", id))?;
        Ok(contract_from_rows(row, rates)?)
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let record = self
            .billing
            .find_invoice(id.into())
            .await?
            .ok_or_else(|| PortError::not_found("Invoice", id))?;
        Ok(invoice_from_record(record)?)
    }

    async fn find_invoice_by_work_order(
        &self,
        work_order_id: WorkOrderId,
    ) -> Result<Option<Invoice>, PortError> {
        match self
            .billing
            .find_invoice_by_work_order(work_order_id.into())
            .await?
        {
            Some(record) => Ok(Some(invoice_from_record(record)?)),
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self, invoice, work_order),
        fields(invoice_number = %invoice.invoice_number, work_order_id = %work_order.id)
    )]
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
        let record = invoice_to_record(invoice)?;
        // mark_invoiced keeps the version, so it still matches the COMPLETED row
        let expected = to_db_version(work_order.version())?;

        if self.billing.commit_invoice(&record, expected).await? {
            debug!(lines = invoice.line_items.len(), "invoice committed");
            return Ok(invoice.clone());
        }

        Err(PortError::conflict(format!(
            "work order {} is no longer COMPLETED at version {}",
            work_order.id,
            work_order.version()
        )))
    }

    #[instrument(skip(self, invoice, payment), fields(invoice_id = %invoice.id, version = invoice.version))]
    async fn append_payment(
        &self,
        invoice: &Invoice,
        payment: &Payment,
    ) -> Result<Invoice, PortError> {
        let now = Utc::now();
        let change = InvoiceStatusChange {
            invoice_id: invoice.id.into(),
            expected_version: to_db_version(invoice.version)?,
            status: invoice.status.as_str(),
            updated_at: now,
        };

        if self
            .billing
            .append_payment(&change, &payment_to_row(payment))
            .await?
        {
            let mut stored = invoice.clone();
            stored.version += 1;
            stored.updated_at = now;
            return Ok(stored);
        }

        Err(self.write_rejected(invoice).await)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, status = %invoice.status))]
    async fn update_invoice_status(&self, invoice: &Invoice) -> Result<Invoice, PortError> {
        let now = Utc::now();
        let change = InvoiceStatusChange {
            invoice_id: invoice.id.into(),
            expected_version: to_db_version(invoice.version)?,
            status: invoice.status.as_str(),
            updated_at: now,
        };

        if self.billing.update_status(&change).await? {
            let mut stored = invoice.clone();
            stored.version += 1;
            stored.updated_at = now;
            return Ok(stored);
        }

        Err(self.write_rejected(invoice).await)
    }
}

impl PostgresBillingAdapter {
    async fn write_rejected(&self, invoice: &Invoice) -> PortError {
        match self.billing.invoice_exists(invoice.id.into()).await {
            Ok(true) => PortError::conflict(format!(
                "invoice {} changed since version {}",
                invoice.id, invoice.version
            )),
            Ok(false) => PortError::not_found("Invoice", invoice.id),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl InvoiceSequence for PostgresBillingAdapter {
    #[instrument(skip(self), fields(period = %period))]
    async fn next_value(&self, period: BillingPeriod) -> Result<u32, PortError> {
        let value = self.billing.next_sequence(&period.key()).await?;
        u32::try_from(value)
            .map_err(|_| PortError::internal(format!("sequence for {} returned {}", period, value)))
    }
}

// --- conversions -----------------------------------------------------------

fn to_db_version(version: u64) -> Result<i64, DatabaseError> {
    i64::try_from(version)
        .map_err(|_| DatabaseError::serialization(format!("version {} out of range", version)))
}

fn from_db_version(version: i64) -> Result<u64, DatabaseError> {
    u64::try_from(version)
        .map_err(|_| DatabaseError::serialization(format!("negative version {}", version)))
}

fn parse_column<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| DatabaseError::serialization(format!("{}: {}", column, e)))
}

fn to_db_int<T>(column: &str, value: T) -> Result<i32, DatabaseError>
where
    T: Copy + std::fmt::Display,
    i32: TryFrom<T>,
{
    i32::try_from(value)
        .map_err(|_| DatabaseError::serialization(format!("{}: {} out of range", column, value)))
}

fn non_negative(column: &str, value: i32) -> Result<u32, DatabaseError> {
    u32::try_from(value)
        .map_err(|_| DatabaseError::serialization(format!("{}: negative value {}", column, value)))
}

fn work_order_to_record(work_order: &WorkOrder) -> Result<WorkOrderRecord, DatabaseError> {
    let id: Uuid = work_order.id.into();
    Ok(WorkOrderRecord {
        header: WorkOrderRow {
            id,
            client_id: work_order.client_id.into(),
            contract_id: work_order.contract_id.map(Into::into),
            technician_id: work_order.technician_id.map(Into::into),
            status: work_order.status().as_str().to_string(),
            priority: work_order.priority.as_str().to_string(),
            service_category: work_order.service_category.as_str().to_string(),
            title: work_order.title.clone(),
            scheduled_start: work_order.scheduled_start,
            scheduled_end: work_order.scheduled_end,
            completed_at: work_order.completed_at,
            budget_amount: work_order.budget.map(|b| b.amount()),
            budget_currency: work_order.budget.map(|b| b.currency().code().to_string()),
            version: to_db_version(work_order.version())?,
            created_at: work_order.created_at,
            updated_at: work_order.updated_at,
        },
        time_entries: work_order
            .time_entries
            .iter()
            .map(|entry| TimeEntryRow {
                id: entry.id.into(),
                work_order_id: id,
                technician_id: entry.technician_id.into(),
                hours: entry.hours,
                work_date: entry.work_date,
                description: entry.description.clone(),
                recorded_at: entry.recorded_at,
            })
            .collect(),
        materials: work_order
            .materials
            .iter()
            .map(|usage| MaterialUsageRow {
                id: usage.id.into(),
                work_order_id: id,
                product_id: usage.product_id.into(),
                product_name: usage.product_name.clone(),
                list_price: usage.list_price.amount(),
                currency: usage.list_price.currency().code().to_string(),
                quantity: usage.quantity,
                unit_price_override: usage.unit_price_override.map(|p| p.amount()),
                recorded_at: usage.recorded_at,
            })
            .collect(),
    })
}

fn work_order_from_record(record: WorkOrderRecord) -> Result<WorkOrder, DatabaseError> {
    let header = record.header;
    let status: WorkOrderStatus = parse_column("work_orders.status", &header.status)?;
    let priority: Priority = parse_column("work_orders.priority", &header.priority)?;

    let budget = match (header.budget_amount, header.budget_currency.as_deref()) {
        (Some(amount), Some(code)) => {
            let currency: Currency = parse_column("work_orders.budget_currency", code)?;
            Some(Money::new(amount, currency))
        }
        _ => None,
    };

    let time_entries = record
        .time_entries
        .into_iter()
        .map(|row| TimeEntry {
            id: row.id.into(),
            technician_id: row.technician_id.into(),
            hours: row.hours,
            work_date: row.work_date,
            description: row.description,
            recorded_at: row.recorded_at,
        })
        .collect();

    let materials = record
        .materials
        .into_iter()
        .map(|row| {
            let currency: Currency = parse_column("material_usages.currency", &row.currency)?;
            Ok(MaterialUsage {
                id: row.id.into(),
                product_id: row.product_id.into(),
                product_name: row.product_name,
                list_price: Money::new(row.list_price, currency),
                quantity: row.quantity,
                unit_price_override: row.unit_price_override.map(|p| Money::new(p, currency)),
                recorded_at: row.recorded_at,
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    let mut work_order = WorkOrder::new(
        header.client_id.into(),
        ServiceCategory::new(&header.service_category),
        header.title,
        priority,
    );
    work_order.id = header.id.into();
    work_order.contract_id = header.contract_id.map(Into::into);
    work_order.technician_id = header.technician_id.map(Into::into);
    work_order.scheduled_start = header.scheduled_start;
    work_order.scheduled_end = header.scheduled_end;
    work_order.completed_at = header.completed_at;
    work_order.budget = budget;
    work_order.time_entries = time_entries;
    work_order.materials = materials;
    work_order.created_at = header.created_at;
    work_order.updated_at = header.updated_at;

    let version = from_db_version(header.version)?;
    let restored = if status == WorkOrderStatus::Invoiced {
        work_order.restore_invoiced(version)
    } else {
        work_order.rehydrate(status, version)
    };
    restored.map_err(|e| DatabaseError::serialization(format!("work order {}: {}", header.id, e)))
}

fn contract_to_rows(
    contract: &Contract,
) -> Result<(ContractRow, Vec<ContractRateRow>), DatabaseError> {
    let id: Uuid = contract.id.into();
    let row = ContractRow {
        id,
        client_id: contract.client_id.into(),
        name: contract.name.clone(),
        payment_terms_days: to_db_int(
            "contracts.payment_terms_days",
            contract.payment_terms_days,
        )?,
        discount_rate: contract.discount.as_fraction(),
        sla_response_hours: contract
            .sla
            .response_hours
            .map(|h| to_db_int("contracts.sla_response_hours", h))
            .transpose()?,
        sla_resolution_hours: contract
            .sla
            .resolution_hours
            .map(|h| to_db_int("contracts.sla_resolution_hours", h))
            .transpose()?,
    };
    let rates = contract
        .rates
        .iter()
        .enumerate()
        .map(|(position, rate)| {
            Ok(ContractRateRow {
                contract_id: id,
                position: to_db_int("contract_rates.position", position)?,
                service_category: rate.service_category.as_str().to_string(),
                hourly_rate: rate.hourly_rate.amount(),
                currency: rate.hourly_rate.currency().code().to_string(),
                night_multiplier: rate.multipliers.night,
                weekend_multiplier: rate.multipliers.weekend,
                holiday_multiplier: rate.multipliers.holiday,
                emergency_multiplier: rate.multipliers.emergency,
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;
    Ok((row, rates))
}

fn contract_from_rows(
    row: ContractRow,
    rates: Vec<ContractRateRow>,
) -> Result<Contract, DatabaseError> {
    let rates = rates
        .into_iter()
        .map(|rate| {
            let currency: Currency = parse_column("contract_rates.currency", &rate.currency)?;
            Ok(ContractRate::new(
                ServiceCategory::new(&rate.service_category),
                Money::new(rate.hourly_rate, currency),
            )
            .with_multipliers(RateMultipliers {
                night: rate.night_multiplier,
                weekend: rate.weekend_multiplier,
                holiday: rate.holiday_multiplier,
                emergency: rate.emergency_multiplier,
            }))
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    let sla = SlaThresholds {
        response_hours: row
            .sla_response_hours
            .map(|h| non_negative("contracts.sla_response_hours", h))
            .transpose()?,
        resolution_hours: row
            .sla_resolution_hours
            .map(|h| non_negative("contracts.sla_resolution_hours", h))
            .transpose()?,
    };

    Ok(Contract {
        id: row.id.into(),
        client_id: row.client_id.into(),
        name: row.name,
        payment_terms_days: non_negative("contracts.payment_terms_days", row.payment_terms_days)?,
        discount: Percentage::from_fraction(row.discount_rate),
        rates,
        sla,
    })
}

fn invoice_to_record(invoice: &Invoice) -> Result<InvoiceRecord, DatabaseError> {
    let id: Uuid = invoice.id.into();
    Ok(InvoiceRecord {
        header: InvoiceRow {
            id,
            invoice_number: invoice.invoice_number.clone(),
            work_order_id: invoice.work_order_id.into(),
            client_id: invoice.client_id.into(),
            contract_id: invoice.contract_id.map(Into::into),
            status: invoice.status.as_str().to_string(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            currency: invoice.currency.code().to_string(),
            subtotal: invoice.subtotal.amount(),
            discount_amount: invoice.discount_amount.amount(),
            tax_rate: invoice.tax_rate.as_fraction(),
            tax_amount: invoice.tax_amount.amount(),
            total_amount: invoice.total_amount.amount(),
            version: to_db_version(invoice.version)?,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        },
        line_items: invoice
            .line_items
            .iter()
            .enumerate()
            .map(|(position, line)| {
                Ok(LineItemRow {
                    id: line.id.into(),
                    invoice_id: id,
                    position: to_db_int("invoice_line_items.position", position)?,
                    kind: line.kind.as_str().to_string(),
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.amount(),
                    line_total: line.line_total.amount(),
                })
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?,
        payments: invoice.payments.iter().map(payment_to_row).collect(),
    })
}

fn invoice_from_record(record: InvoiceRecord) -> Result<Invoice, DatabaseError> {
    let header = record.header;
    let currency: Currency = parse_column("invoices.currency", &header.currency)?;
    let status: InvoiceStatus = parse_column("invoices.status", &header.status)?;

    let line_items = record
        .line_items
        .into_iter()
        .map(|row| {
            let kind: LineItemKind = parse_column("invoice_line_items.kind", &row.kind)?;
            Ok(InvoiceLineItem {
                id: row.id.into(),
                kind,
                description: row.description,
                quantity: row.quantity,
                unit_price: Money::new(row.unit_price, currency),
                line_total: Money::new(row.line_total, currency),
            })
        })
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    let payments = record
        .payments
        .into_iter()
        .map(payment_from_row)
        .collect::<Result<Vec<_>, DatabaseError>>()?;

    Ok(Invoice {
        id: header.id.into(),
        invoice_number: header.invoice_number,
        work_order_id: header.work_order_id.into(),
        client_id: header.client_id.into(),
        contract_id: header.contract_id.map(Into::into),
        status,
        issue_date: header.issue_date,
        due_date: header.due_date,
        currency,
        line_items,
        subtotal: Money::new(header.subtotal, currency),
        discount_amount: Money::new(header.discount_amount, currency),
        tax_rate: Percentage::from_fraction(header.tax_rate),
        tax_amount: Money::new(header.tax_amount, currency),
        total_amount: Money::new(header.total_amount, currency),
        payments,
        version: from_db_version(header.version)?,
        created_at: header.created_at,
        updated_at: header.updated_at,
    })
}

fn payment_to_row(payment: &Payment) -> PaymentRow {
    PaymentRow {
        id: payment.id.into(),
        invoice_id: payment.invoice_id.into(),
        amount: payment.amount.amount(),
        currency: payment.amount.currency().code().to_string(),
        method: payment.method.as_str().to_string(),
        reference: payment.reference.clone(),
        payment_date: payment.payment_date,
    }
}

fn payment_from_row(row: PaymentRow) -> Result<Payment, DatabaseError> {
    let currency: Currency = parse_column("payments.currency", &row.currency)?;
    let method: PaymentMethod = parse_column("payments.method", &row.method)?;
    Ok(Payment {
        id: row.id.into(),
        invoice_id: row.invoice_id.into(),
        amount: Money::new(row.amount, currency),
        method,
        reference: row.reference,
        payment_date: row.payment_date,
    })
}
