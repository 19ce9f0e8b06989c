//! Work Order Domain Ports
//!
//! `WorkOrderPort` is the storage seam for staff-driven changes. Adapters must
//! honour two rules:
//!
//! - `save_work_order` succeeds only if the stored version equals
//!   `work_order.version()`; otherwise it returns `PortError::Conflict`
//! - `save_work_order` never writes `INVOICED`; that status is persisted only
//!   by the billing store's atomic invoice commit

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError, WorkOrderId};

use crate::work_order::WorkOrder;

/// Storage operations for work orders
#[async_trait]
pub trait WorkOrderPort: DomainPort {
    /// Inserts a new work order
    async fn create_work_order(&self, work_order: &WorkOrder) -> Result<WorkOrder, PortError>;

    /// Loads a work order with its time entries and materials
    async fn get_work_order(&self, id: WorkOrderId) -> Result<WorkOrder, PortError>;

    /// Persists a staff-driven change, returning the stored copy with its
    /// version advanced by one
    async fn save_work_order(&self, work_order: &WorkOrder) -> Result<WorkOrder, PortError>;
}

/// Mock implementation of WorkOrderPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use crate::lifecycle::WorkOrderStatus;

    /// In-memory mock implementation of WorkOrderPort
    #[derive(Debug, Default, Clone)]
    pub struct MockWorkOrderPort {
        work_orders: Arc<RwLock<HashMap<WorkOrderId, WorkOrder>>>,
    }

    impl MockWorkOrderPort {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DomainPort for MockWorkOrderPort {}

    #[async_trait]
    impl WorkOrderPort for MockWorkOrderPort {
        async fn create_work_order(&self, work_order: &WorkOrder) -> Result<WorkOrder, PortError> {
            let mut store = self.work_orders.write().await;
            if store.contains_key(&work_order.id) {
                return Err(PortError::unique_violation("work_orders_pkey", work_order.id.to_string()));
            }
            store.insert(work_order.id, work_order.clone());
            Ok(work_order.clone())
        }

        async fn get_work_order(&self, id: WorkOrderId) -> Result<WorkOrder, PortError> {
            self.work_orders
                .read()
                .await
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
            let mut store = self.work_orders.write().await;
            let stored = store
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
            store.insert(saved.id, saved.clone());
            Ok(saved)
        }
    }
}
