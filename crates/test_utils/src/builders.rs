//! Test Data Builders
//!
//! Builders for work orders and contracts with sensible defaults, so tests
//! only spell out the fields they care about.

use chrono::{DateTime, Utc};
use core_kernel::{ClientId, ContractId, Money, ProductId, TechnicianId};
use domain_billing::{Contract, ContractRate, SlaThresholds};
use domain_workorder::{
    mark_invoiced, MaterialUsage, Priority, ServiceCategory, TimeEntry, WorkOrder,
    WorkOrderStatus,
};
use fake::faker::company::en::CompanyName;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use rust_decimal::Decimal;

use crate::fixtures::TemporalFixtures;

/// Builder for work orders in any lifecycle state
pub struct WorkOrderBuilder {
    client_id: ClientId,
    contract_id: Option<ContractId>,
    category: String,
    title: String,
    priority: Priority,
    technician_id: TechnicianId,
    hours: Vec<Decimal>,
    materials: Vec<(String, Money, Decimal)>,
    budget: Option<Money>,
    scheduled_start: Option<DateTime<Utc>>,
    status: WorkOrderStatus,
}

impl Default for WorkOrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkOrderBuilder {
    /// Creates a builder for a `REQUESTED` general-category work order
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            contract_id: None,
            category: "general".to_string(),
            title: Sentence(3..6).fake(),
            priority: Priority::Normal,
            technician_id: TechnicianId::new(),
            hours: Vec::new(),
            materials: Vec::new(),
            budget: None,
            scheduled_start: None,
            status: WorkOrderStatus::Requested,
        }
    }

    pub fn client(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn contract(mut self, contract_id: ContractId) -> Self {
        self.contract_id = Some(contract_id);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds one time entry on the fixture work date
    pub fn hours(mut self, hours: Decimal) -> Self {
        self.hours.push(hours);
        self
    }

    pub fn material(mut self, name: impl Into<String>, unit_price: Money, quantity: Decimal) -> Self {
        self.materials.push((name.into(), unit_price, quantity));
        self
    }

    pub fn budget(mut self, budget: Money) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Schedules the visit; the work order passes through `SCHEDULED`
    pub fn scheduled_at(mut self, start: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(start);
        self
    }

    /// Target lifecycle state, reached through the named transitions
    pub fn status(mut self, status: WorkOrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn completed(self) -> Self {
        self.status(WorkOrderStatus::Completed)
    }

    /// Builds the work order
    ///
    /// # Panics
    ///
    /// Panics if an entry or material is invalid; builders are for tests only.
    pub fn build(self) -> WorkOrder {
        let mut wo = WorkOrder::new(
            self.client_id,
            ServiceCategory::new(&self.category),
            self.title,
            self.priority,
        );
        if let Some(contract_id) = self.contract_id {
            wo = wo.with_contract(contract_id);
        }
        if let Some(budget) = self.budget {
            wo = wo.with_budget(budget);
        }

        wo.assign_technician(self.technician_id)
            .expect("assign technician");
        for hours in self.hours {
            let entry = TimeEntry::new(self.technician_id, hours, TemporalFixtures::work_date())
                .expect("valid time entry");
            wo.log_time(entry).expect("log time");
        }
        for (name, price, quantity) in self.materials {
            let usage = MaterialUsage::new(ProductId::new(), name, price, quantity)
                .expect("valid material");
            wo.add_material(usage).expect("add material");
        }
        if let Some(start) = self.scheduled_start {
            wo.schedule(start, None).expect("schedule");
        }

        match self.status {
            WorkOrderStatus::Requested => {}
            WorkOrderStatus::Scheduled => {
                if wo.status() != WorkOrderStatus::Scheduled {
                    wo.schedule(TemporalFixtures::now(), None).expect("schedule");
                }
            }
            WorkOrderStatus::InProgress => wo.start().expect("start"),
            WorkOrderStatus::Pending => {
                wo.start().expect("start");
                wo.hold().expect("hold");
            }
            WorkOrderStatus::Completed => {
                wo.start().expect("start");
                wo.complete(TemporalFixtures::completed_at()).expect("complete");
            }
            WorkOrderStatus::Cancelled => wo.cancel().expect("cancel"),
            WorkOrderStatus::Invoiced => {
                wo.start().expect("start");
                wo.complete(TemporalFixtures::completed_at()).expect("complete");
                wo = mark_invoiced(wo).expect("mark invoiced");
            }
        }
        wo
    }
}

/// Builder for contracts
pub struct ContractBuilder {
    client_id: ClientId,
    name: String,
    payment_terms_days: Option<u32>,
    discount_percent: Decimal,
    rates: Vec<ContractRate>,
    sla: SlaThresholds,
}

impl Default for ContractBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractBuilder {
    /// Creates a builder with standard terms and no rates
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            name: CompanyName().fake(),
            payment_terms_days: None,
            discount_percent: Decimal::ZERO,
            rates: Vec::new(),
            sla: SlaThresholds::default(),
        }
    }

    pub fn client(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn payment_terms(mut self, days: u32) -> Self {
        self.payment_terms_days = Some(days);
        self
    }

    pub fn discount_percent(mut self, percent: Decimal) -> Self {
        self.discount_percent = percent;
        self
    }

    pub fn rate(mut self, rate: ContractRate) -> Self {
        self.rates.push(rate);
        self
    }

    pub fn sla(mut self, response_hours: u32, resolution_hours: u32) -> Self {
        self.sla = SlaThresholds {
            response_hours: Some(response_hours),
            resolution_hours: Some(resolution_hours),
        };
        self
    }

    pub fn build(self) -> Contract {
        let mut contract = Contract::new(self.client_id, self.name)
            .with_discount_percent(self.discount_percent)
            .with_sla(self.sla);
        if let Some(days) = self.payment_terms_days {
            contract = contract.with_payment_terms(days);
        }
        self.rates
            .into_iter()
            .fold(contract, |contract, rate| contract.with_rate(rate))
    }
}
