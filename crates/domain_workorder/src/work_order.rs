//! Work order aggregate
//!
//! Status is private: it changes only through the named operations below
//! (and [`crate::lifecycle::mark_invoiced`]), never through a generic setter.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    ClientId, ContractId, MaterialUsageId, Money, ProductId, TechnicianId, TimeEntryId,
    WorkOrderId,
};

use crate::error::WorkOrderError;
use crate::lifecycle::{check_staff_transition, mark_invoiced, WorkOrderStatus};

/// Longest shift a single time entry may record
const MAX_HOURS_PER_ENTRY: Decimal = dec!(24);

/// Work order priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    /// Billed with the contract's emergency multiplier
    Emergency,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Emergency => "EMERGENCY",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Priority::Low, Priority::Normal, Priority::High, Priority::Emergency]
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown priority '{}'", s))
    }
}

/// Category of service, used to pick the contract rate
///
/// Stored trimmed and lower-cased so `"HVAC "` and `"hvac"` match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ServiceCategory(String);

impl ServiceCategory {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ServiceCategory {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<ServiceCategory> for String {
    fn from(value: ServiceCategory) -> Self {
        value.0
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hours logged by a technician; immutable once recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub technician_id: TechnicianId,
    pub hours: Decimal,
    pub work_date: NaiveDate,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Creates a time entry, rejecting non-positive or implausible hours
    pub fn new(
        technician_id: TechnicianId,
        hours: Decimal,
        work_date: NaiveDate,
    ) -> Result<Self, WorkOrderError> {
        if hours <= Decimal::ZERO {
            return Err(WorkOrderError::InvalidTimeEntry(format!(
                "hours must be positive, got {}",
                hours
            )));
        }
        if hours > MAX_HOURS_PER_ENTRY {
            return Err(WorkOrderError::InvalidTimeEntry(format!(
                "a single entry cannot exceed {} hours, got {}",
                MAX_HOURS_PER_ENTRY, hours
            )));
        }

        Ok(Self {
            id: TimeEntryId::new_v7(),
            technician_id,
            hours,
            work_date,
            description: None,
            recorded_at: Utc::now(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Material consumed on the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialUsage {
    pub id: MaterialUsageId,
    pub product_id: ProductId,
    pub product_name: String,
    /// The product's catalogue price at the time of use
    pub list_price: Money,
    pub quantity: Decimal,
    /// Negotiated price replacing the list price on the invoice
    pub unit_price_override: Option<Money>,
    pub recorded_at: DateTime<Utc>,
}

impl MaterialUsage {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        list_price: Money,
        quantity: Decimal,
    ) -> Result<Self, WorkOrderError> {
        if quantity <= Decimal::ZERO {
            return Err(WorkOrderError::InvalidMaterial(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        if list_price.is_negative() {
            return Err(WorkOrderError::InvalidMaterial(format!(
                "list price cannot be negative, got {}",
                list_price
            )));
        }

        Ok(Self {
            id: MaterialUsageId::new_v7(),
            product_id,
            product_name: product_name.into(),
            list_price,
            quantity,
            unit_price_override: None,
            recorded_at: Utc::now(),
        })
    }

    pub fn with_unit_price(mut self, price: Money) -> Result<Self, WorkOrderError> {
        if price.is_negative() {
            return Err(WorkOrderError::InvalidMaterial(format!(
                "unit price cannot be negative, got {}",
                price
            )));
        }
        self.unit_price_override = Some(price);
        Ok(self)
    }

    /// The price billed per unit
    pub fn unit_price(&self) -> Money {
        self.unit_price_override.unwrap_or(self.list_price)
    }
}

/// A unit of requested field service work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub client_id: ClientId,
    pub contract_id: Option<ContractId>,
    pub technician_id: Option<TechnicianId>,
    status: WorkOrderStatus,
    pub priority: Priority,
    pub service_category: ServiceCategory,
    pub title: String,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Flat fee billed when no time was logged
    pub budget: Option<Money>,
    pub time_entries: Vec<TimeEntry>,
    pub materials: Vec<MaterialUsage>,
    version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    /// Creates a newly requested work order
    pub fn new(
        client_id: ClientId,
        service_category: ServiceCategory,
        title: impl Into<String>,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkOrderId::new_v7(),
            client_id,
            contract_id: None,
            technician_id: None,
            status: WorkOrderStatus::Requested,
            priority,
            service_category,
            title: title.into(),
            scheduled_start: None,
            scheduled_end: None,
            completed_at: None,
            budget: None,
            time_entries: Vec::new(),
            materials: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_contract(mut self, contract_id: ContractId) -> Self {
        self.contract_id = Some(contract_id);
        self
    }

    pub fn with_budget(mut self, budget: Money) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Restores a persisted status and version
    ///
    /// `INVOICED` is refused; stored invoiced rows load through
    /// [`WorkOrder::restore_invoiced`].
    pub fn rehydrate(
        mut self,
        status: WorkOrderStatus,
        version: u64,
    ) -> Result<Self, WorkOrderError> {
        if status == WorkOrderStatus::Invoiced {
            return Err(WorkOrderError::InvalidState {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.version = version;
        Ok(self)
    }

    /// Restores a stored `INVOICED` row
    ///
    /// The row must carry a completion time; the status is reached through
    /// `mark_invoiced` from `COMPLETED`, keeping `updated_at` as stored.
    pub fn restore_invoiced(self, version: u64) -> Result<Self, WorkOrderError> {
        if self.completed_at.is_none() {
            return Err(WorkOrderError::InvalidState {
                from: self.status,
                to: WorkOrderStatus::Invoiced,
            });
        }
        let updated_at = self.updated_at;
        let mut invoiced = mark_invoiced(self.rehydrate(WorkOrderStatus::Completed, version)?)?;
        invoiced.updated_at = updated_at;
        Ok(invoiced)
    }

    /// Sets the version a store assigned on save, keeping the status
    pub fn with_stored_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn status(&self) -> WorkOrderStatus {
        self.status
    }

    /// Optimistic concurrency token
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Total hours across all time entries
    pub fn total_hours(&self) -> Decimal {
        self.time_entries.iter().map(|e| e.hours).sum()
    }

    /// Schedules (or reschedules) the visit
    pub fn schedule(
        &mut self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(), WorkOrderError> {
        if let Some(end) = end {
            if end <= start {
                return Err(WorkOrderError::InvalidSchedule(format!(
                    "end {} is not after start {}",
                    end, start
                )));
            }
        }
        if self.status != WorkOrderStatus::Scheduled {
            self.transition_to(WorkOrderStatus::Scheduled)?;
        }
        self.scheduled_start = Some(start);
        self.scheduled_end = end;
        self.touch();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), WorkOrderError> {
        self.transition_to(WorkOrderStatus::InProgress)
    }

    /// Parks the work order in `PENDING`
    pub fn hold(&mut self) -> Result<(), WorkOrderError> {
        self.transition_to(WorkOrderStatus::Pending)
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), WorkOrderError> {
        self.transition_to(WorkOrderStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), WorkOrderError> {
        self.transition_to(WorkOrderStatus::Cancelled)
    }

    pub fn assign_technician(&mut self, technician_id: TechnicianId) -> Result<(), WorkOrderError> {
        self.ensure_mutable()?;
        self.technician_id = Some(technician_id);
        self.touch();
        Ok(())
    }

    pub fn log_time(&mut self, entry: TimeEntry) -> Result<(), WorkOrderError> {
        self.ensure_mutable()?;
        self.time_entries.push(entry);
        self.touch();
        Ok(())
    }

    pub fn add_material(&mut self, usage: MaterialUsage) -> Result<(), WorkOrderError> {
        self.ensure_mutable()?;
        self.materials.push(usage);
        self.touch();
        Ok(())
    }

    pub(crate) fn set_status(&mut self, status: WorkOrderStatus) {
        self.status = status;
        self.touch();
    }

    fn transition_to(&mut self, next: WorkOrderStatus) -> Result<(), WorkOrderError> {
        check_staff_transition(self.status, next)?;
        tracing::debug!(work_order_id = %self.id, from = %self.status, to = %next, "work order transition");
        self.set_status(next);
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), WorkOrderError> {
        if self.status.is_terminal() {
            return Err(WorkOrderError::TerminalState(self.status));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
