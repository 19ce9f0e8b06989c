//! Work order repository
//!
//! Header rows live in `work_orders`; time entries and materials are
//! append-only child tables. Header updates are guarded on `version`, and
//! `INVOICED` rows are never touched from here.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Database row for a work order header
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkOrderRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub service_category: String,
    pub title: String,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub budget_amount: Option<Decimal>,
    pub budget_currency: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimeEntryRow {
    pub id: Uuid,
    pub work_order_id: Uuid,
    pub technician_id: Uuid,
    pub hours: Decimal,
    pub work_date: NaiveDate,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MaterialUsageRow {
    pub id: Uuid,
    pub work_order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub list_price: Decimal,
    pub currency: String,
    pub quantity: Decimal,
    pub unit_price_override: Option<Decimal>,
    pub recorded_at: DateTime<Utc>,
}

/// A work order header with its child rows
#[derive(Debug, Clone)]
pub struct WorkOrderRecord {
    pub header: WorkOrderRow,
    pub time_entries: Vec<TimeEntryRow>,
    pub materials: Vec<MaterialUsageRow>,
}

/// Repository for work orders and their billable work
#[derive(Debug, Clone)]
pub struct WorkOrderRepository {
    pool: PgPool,
}

impl WorkOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new work order with any entries it already carries
    pub async fn insert(&self, record: &WorkOrderRecord) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let header = &record.header;

        sqlx::query(
            r#"
            INSERT INTO work_orders (
                id, client_id, contract_id, technician_id, status, priority,
                service_category, title, scheduled_start, scheduled_end, completed_at,
                budget_amount, budget_currency, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(header.id)
        .bind(header.client_id)
        .bind(header.contract_id)
        .bind(header.technician_id)
        .bind(&header.status)
        .bind(&header.priority)
        .bind(&header.service_category)
        .bind(&header.title)
        .bind(header.scheduled_start)
        .bind(header.scheduled_end)
        .bind(header.completed_at)
        .bind(header.budget_amount)
        .bind(&header.budget_currency)
        .bind(header.version)
        .bind(header.created_at)
        .bind(header.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_children(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Loads a work order with its time entries and materials
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkOrderRecord>, DatabaseError> {
        let header = sqlx::query_as::<_, WorkOrderRow>(
            r#"
            SELECT id, client_id, contract_id, technician_id, status, priority,
                   service_category, title, scheduled_start, scheduled_end, completed_at,
                   budget_amount, budget_currency, version, created_at, updated_at
            FROM work_orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let time_entries = sqlx::query_as::<_, TimeEntryRow>(
            r#"
            SELECT id, work_order_id, technician_id, hours, work_date, description, recorded_at
            FROM time_entries
            WHERE work_order_id = $1
            ORDER BY recorded_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let materials = sqlx::query_as::<_, MaterialUsageRow>(
            r#"
            SELECT id, work_order_id, product_id, product_name, list_price, currency,
                   quantity, unit_price_override, recorded_at
            FROM material_usages
            WHERE work_order_id = $1
            ORDER BY recorded_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(WorkOrderRecord {
            header,
            time_entries,
            materials,
        }))
    }

    /// Writes a staff-driven change if the stored row is still at
    /// `expected_version` and not yet invoiced
    ///
    /// Returns `false` without writing anything when the guard fails.
    pub async fn update_guarded(
        &self,
        record: &WorkOrderRecord,
        expected_version: i64,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let header = &record.header;

        let result = sqlx::query(
            r#"
            UPDATE work_orders
            SET contract_id = $3,
                technician_id = $4,
                status = $5,
                priority = $6,
                service_category = $7,
                title = $8,
                scheduled_start = $9,
                scheduled_end = $10,
                completed_at = $11,
                budget_amount = $12,
                budget_currency = $13,
                version = $14,
                updated_at = $15
            WHERE id = $1 AND version = $2 AND status <> 'INVOICED'
            "#,
        )
        .bind(header.id)
        .bind(expected_version)
        .bind(header.contract_id)
        .bind(header.technician_id)
        .bind(&header.status)
        .bind(&header.priority)
        .bind(&header.service_category)
        .bind(&header.title)
        .bind(header.scheduled_start)
        .bind(header.scheduled_end)
        .bind(header.completed_at)
        .bind(header.budget_amount)
        .bind(&header.budget_currency)
        .bind(header.version)
        .bind(header.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_children(&mut tx, record).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Current version of a work order, if it exists
    pub async fn version_of(&self, id: Uuid) -> Result<Option<i64>, DatabaseError> {
        let version = sqlx::query_scalar::<_, i64>("SELECT version FROM work_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }
}

/// Entries are immutable once recorded, so existing ids are skipped
async fn insert_children(
    tx: &mut Transaction<'_, Postgres>,
    record: &WorkOrderRecord,
) -> Result<(), DatabaseError> {
    for entry in &record.time_entries {
        sqlx::query(
            r#"
            INSERT INTO time_entries (
                id, work_order_id, technician_id, hours, work_date, description, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(entry.work_order_id)
        .bind(entry.technician_id)
        .bind(entry.hours)
        .bind(entry.work_date)
        .bind(&entry.description)
        .bind(entry.recorded_at)
        .execute(&mut **tx)
        .await?;
    }

    for material in &record.materials {
        sqlx::query(
            r#"
            INSERT INTO material_usages (
                id, work_order_id, product_id, product_name, list_price, currency,
                quantity, unit_price_override, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(material.id)
        .bind(material.work_order_id)
        .bind(material.product_id)
        .bind(&material.product_name)
        .bind(material.list_price)
        .bind(&material.currency)
        .bind(material.quantity)
        .bind(material.unit_price_override)
        .bind(material.recorded_at)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
