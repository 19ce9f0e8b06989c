//! Work order DTOs

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::Currency;
use domain_workorder::{MaterialUsage, Priority, TimeEntry, WorkOrder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkOrderRequest {
    pub client_id: Uuid,
    pub contract_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub service_category: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    /// Flat fee billed when no time is logged
    pub budget: Option<Decimal>,
    /// Defaults to the billing currency
    pub currency: Option<Currency>,
}

fn default_priority() -> Priority {
    Priority::Normal
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScheduleRequest {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignTechnicianRequest {
    pub technician_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LogTimeRequest {
    pub technician_id: Uuid,
    pub hours: Decimal,
    pub work_date: NaiveDate,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMaterialRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    pub list_price: Decimal,
    pub quantity: Decimal,
    /// Negotiated price replacing the list price
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct TimeEntryResponse {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub hours: Decimal,
    pub work_date: NaiveDate,
    pub description: Option<String>,
}

impl From<&TimeEntry> for TimeEntryResponse {
    fn from(entry: &TimeEntry) -> Self {
        Self {
            id: entry.id.into(),
            technician_id: entry.technician_id.into(),
            hours: entry.hours,
            work_date: entry.work_date,
            description: entry.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MaterialResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: Decimal,
    pub list_price: Decimal,
    pub unit_price: Decimal,
    pub currency: Currency,
}

impl From<&MaterialUsage> for MaterialResponse {
    fn from(usage: &MaterialUsage) -> Self {
        Self {
            id: usage.id.into(),
            product_id: usage.product_id.into(),
            product_name: usage.product_name.clone(),
            quantity: usage.quantity,
            list_price: usage.list_price.amount(),
            unit_price: usage.unit_price().amount(),
            currency: usage.list_price.currency(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkOrderResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub status: String,
    pub priority: Priority,
    pub service_category: String,
    pub title: String,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub budget: Option<Decimal>,
    pub total_hours: Decimal,
    pub time_entries: Vec<TimeEntryResponse>,
    pub materials: Vec<MaterialResponse>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkOrder> for WorkOrderResponse {
    fn from(wo: &WorkOrder) -> Self {
        Self {
            id: wo.id.into(),
            client_id: wo.client_id.into(),
            contract_id: wo.contract_id.map(Into::into),
            technician_id: wo.technician_id.map(Into::into),
            status: wo.status().as_str().to_string(),
            priority: wo.priority,
            service_category: wo.service_category.as_str().to_string(),
            title: wo.title.clone(),
            scheduled_start: wo.scheduled_start,
            scheduled_end: wo.scheduled_end,
            completed_at: wo.completed_at,
            budget: wo.budget.map(|b| b.amount()),
            total_hours: wo.total_hours(),
            time_entries: wo.time_entries.iter().map(Into::into).collect(),
            materials: wo.materials.iter().map(Into::into).collect(),
            version: wo.version(),
            created_at: wo.created_at,
            updated_at: wo.updated_at,
        }
    }
}
