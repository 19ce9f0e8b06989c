//! Work order application service
//!
//! Each operation loads the aggregate, applies exactly one named transition,
//! and saves it back guarded by the loaded version. There is deliberately no
//! operation that writes an arbitrary status.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{Clock, TechnicianId, WorkOrderId};

use crate::error::WorkOrderError;
use crate::ports::WorkOrderPort;
use crate::work_order::{MaterialUsage, TimeEntry, WorkOrder};

/// Staff-facing operations on work orders
#[derive(Clone)]
pub struct WorkOrderService {
    port: Arc<dyn WorkOrderPort>,
    clock: Arc<dyn Clock>,
}

impl WorkOrderService {
    pub fn new(port: Arc<dyn WorkOrderPort>, clock: Arc<dyn Clock>) -> Self {
        Self { port, clock }
    }

    /// Registers a newly requested work order
    #[instrument(skip(self, work_order), fields(work_order_id = %work_order.id))]
    pub async fn open(&self, work_order: WorkOrder) -> Result<WorkOrder, WorkOrderError> {
        let created = self.port.create_work_order(&work_order).await?;
        info!(client_id = %created.client_id, "work order opened");
        Ok(created)
    }

    pub async fn get(&self, id: WorkOrderId) -> Result<WorkOrder, WorkOrderError> {
        Ok(self.port.get_work_order(id).await?)
    }

    pub async fn schedule(
        &self,
        id: WorkOrderId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<WorkOrder, WorkOrderError> {
        self.apply(id, "schedule", |wo| wo.schedule(start, end)).await
    }

    pub async fn start(&self, id: WorkOrderId) -> Result<WorkOrder, WorkOrderError> {
        self.apply(id, "start", WorkOrder::start).await
    }

    pub async fn hold(&self, id: WorkOrderId) -> Result<WorkOrder, WorkOrderError> {
        self.apply(id, "hold", WorkOrder::hold).await
    }

    /// Marks the work complete, stamping the completion time from the clock
    pub async fn complete(&self, id: WorkOrderId) -> Result<WorkOrder, WorkOrderError> {
        let at = self.clock.now();
        self.apply(id, "complete", |wo| wo.complete(at)).await
    }

    pub async fn cancel(&self, id: WorkOrderId) -> Result<WorkOrder, WorkOrderError> {
        self.apply(id, "cancel", WorkOrder::cancel).await
    }

    pub async fn assign_technician(
        &self,
        id: WorkOrderId,
        technician_id: TechnicianId,
    ) -> Result<WorkOrder, WorkOrderError> {
        self.apply(id, "assign_technician", |wo| wo.assign_technician(technician_id))
            .await
    }

    pub async fn log_time(
        &self,
        id: WorkOrderId,
        entry: TimeEntry,
    ) -> Result<WorkOrder, WorkOrderError> {
        self.apply(id, "log_time", |wo| wo.log_time(entry)).await
    }

    pub async fn add_material(
        &self,
        id: WorkOrderId,
        usage: MaterialUsage,
    ) -> Result<WorkOrder, WorkOrderError> {
        self.apply(id, "add_material", |wo| wo.add_material(usage)).await
    }

    #[instrument(skip(self, change), fields(work_order_id = %id))]
    async fn apply<F>(
        &self,
        id: WorkOrderId,
        operation: &'static str,
        change: F,
    ) -> Result<WorkOrder, WorkOrderError>
    where
        F: FnOnce(&mut WorkOrder) -> Result<(), WorkOrderError> + Send,
    {
        let mut work_order = self.port.get_work_order(id).await?;
        change(&mut work_order)?;
        let saved = self.port.save_work_order(&work_order).await?;
        info!(operation, status = %saved.status(), version = saved.version(), "work order updated");
        Ok(saved)
    }
}
