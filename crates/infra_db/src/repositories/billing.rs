//! Billing repository
//!
//! Contracts, invoices, payments and the per-period invoice counters. The two
//! multi-table writes, invoice commit and payment append, each run in a
//! single transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContractRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub payment_terms_days: i32,
    pub discount_rate: Decimal,
    pub sla_response_hours: Option<i32>,
    pub sla_resolution_hours: Option<i32>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContractRateRow {
    pub contract_id: Uuid,
    pub position: i32,
    pub service_category: String,
    pub hourly_rate: Decimal,
    pub currency: String,
    pub night_multiplier: Decimal,
    pub weekend_multiplier: Decimal,
    pub holiday_multiplier: Decimal,
    pub emergency_multiplier: Decimal,
}

/// Database row for an invoice header
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub work_order_id: Uuid,
    pub client_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub kind: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub reference: Option<String>,
    pub payment_date: DateTime<Utc>,
}

/// An invoice header with its lines and payment history
#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    pub header: InvoiceRow,
    pub line_items: Vec<LineItemRow>,
    pub payments: Vec<PaymentRow>,
}

/// Status change written alongside a guarded invoice update
#[derive(Debug, Clone)]
pub struct InvoiceStatusChange<'a> {
    pub invoice_id: Uuid,
    pub expected_version: i64,
    pub status: &'a str,
    pub updated_at: DateTime<Utc>,
}

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, work_order_id, client_id, contract_id, status, issue_date,
    due_date, currency, subtotal, discount_amount, tax_rate, tax_amount, total_amount,
    version, created_at, updated_at
"#;

/// Repository for contracts, invoices and payments
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_contract(
        &self,
        contract: &ContractRow,
        rates: &[ContractRateRow],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contracts (
                id, client_id, name, payment_terms_days, discount_rate,
                sla_response_hours, sla_resolution_hours
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(contract.id)
        .bind(contract.client_id)
        .bind(&contract.name)
        .bind(contract.payment_terms_days)
        .bind(contract.discount_rate)
        .bind(contract.sla_response_hours)
        .bind(contract.sla_resolution_hours)
        .execute(&mut *tx)
        .await?;

        for rate in rates {
            sqlx::query(
                r#"
                INSERT INTO contract_rates (
                    contract_id, position, service_category, hourly_rate, currency,
                    night_multiplier, weekend_multiplier, holiday_multiplier, emergency_multiplier
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(rate.contract_id)
            .bind(rate.position)
            .bind(&rate.service_category)
            .bind(rate.hourly_rate)
            .bind(&rate.currency)
            .bind(rate.night_multiplier)
            .bind(rate.weekend_multiplier)
            .bind(rate.holiday_multiplier)
            .bind(rate.emergency_multiplier)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn find_contract(
        &self,
        id: Uuid,
    ) -> Result<Option<(ContractRow, Vec<ContractRateRow>)>, DatabaseError> {
        let contract = sqlx::query_as::<_, ContractRow>(
            r#"
            SELECT id, client_id, name, payment_terms_days, discount_rate,
                   sla_response_hours, sla_resolution_hours
            FROM contracts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(contract) = contract else {
            return Ok(None);
        };

        let rates = sqlx::query_as::<_, ContractRateRow>(
            r#"
            SELECT contract_id, position, service_category, hourly_rate, currency,
                   night_multiplier, weekend_multiplier, holiday_multiplier, emergency_multiplier
            FROM contract_rates
            WHERE contract_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((contract, rates)))
    }

    pub async fn find_invoice(&self, id: Uuid) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let header = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match header {
            Some(header) => Ok(Some(self.load_children(header).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_invoice_by_work_order(
        &self,
        work_order_id: Uuid,
    ) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let header = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE work_order_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(work_order_id)
        .fetch_optional(&self.pool)
        .await?;

        match header {
            Some(header) => Ok(Some(self.load_children(header).await?)),
            None => Ok(None),
        }
    }

    async fn load_children(&self, header: InvoiceRow) -> Result<InvoiceRecord, DatabaseError> {
        let line_items = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT id, invoice_id, position, kind, description, quantity, unit_price, line_total
            FROM invoice_line_items
            WHERE invoice_id = $1
            ORDER BY position
            "#,
        )
        .bind(header.id)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, invoice_id, amount, currency, method, reference, payment_date
            FROM payments
            WHERE invoice_id = $1
            ORDER BY recorded_at, id
            "#,
        )
        .bind(header.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(InvoiceRecord {
            header,
            line_items,
            payments,
        })
    }

    /// Inserts the invoice and its lines, then flips the work order from
    /// `COMPLETED` at `work_order_version` to `INVOICED`
    ///
    /// Unique violations on either invoice key surface as
    /// `DatabaseError::UniqueViolation`. Returns `false` and rolls back when
    /// the work order guard fails.
    pub async fn commit_invoice(
        &self,
        record: &InvoiceRecord,
        work_order_version: i64,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let header = &record.header;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, work_order_id, client_id, contract_id, status,
                issue_date, due_date, currency, subtotal, discount_amount, tax_rate,
                tax_amount, total_amount, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(header.id)
        .bind(&header.invoice_number)
        .bind(header.work_order_id)
        .bind(header.client_id)
        .bind(header.contract_id)
        .bind(&header.status)
        .bind(header.issue_date)
        .bind(header.due_date)
        .bind(&header.currency)
        .bind(header.subtotal)
        .bind(header.discount_amount)
        .bind(header.tax_rate)
        .bind(header.tax_amount)
        .bind(header.total_amount)
        .bind(header.version)
        .bind(header.created_at)
        .bind(header.updated_at)
        .execute(&mut *tx)
        .await?;

        for line in &record.line_items {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (
                    id, invoice_id, position, kind, description, quantity, unit_price, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id)
            .bind(line.invoice_id)
            .bind(line.position)
            .bind(&line.kind)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE work_orders
            SET status = 'INVOICED', version = version + 1, updated_at = $3
            WHERE id = $1 AND version = $2 AND status = 'COMPLETED'
            "#,
        )
        .bind(header.work_order_id)
        .bind(work_order_version)
        .bind(header.created_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Stores a new status and bumps the version if it still matches
    pub async fn update_status(&self, change: &InvoiceStatusChange<'_>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = $3, version = version + 1, updated_at = $4
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(change.invoice_id)
        .bind(change.expected_version)
        .bind(change.status)
        .bind(change.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Guarded status update plus payment insert in one transaction
    pub async fn append_payment(
        &self,
        change: &InvoiceStatusChange<'_>,
        payment: &PaymentRow,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = $3, version = version + 1, updated_at = $4
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(change.invoice_id)
        .bind(change.expected_version)
        .bind(change.status)
        .bind(change.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, invoice_id, amount, currency, method, reference, payment_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id)
        .bind(payment.invoice_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.method)
        .bind(&payment.reference)
        .bind(payment.payment_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn invoice_exists(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM invoices WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Atomically allocates the next counter value for a `YYYYMM` period
    pub async fn next_sequence(&self, period_key: &str) -> Result<i32, DatabaseError> {
        let value = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO invoice_sequences (period, last_value)
            VALUES ($1, 1)
            ON CONFLICT (period)
            DO UPDATE SET last_value = invoice_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(period_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }
}
