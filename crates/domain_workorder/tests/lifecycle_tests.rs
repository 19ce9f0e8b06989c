//! Tests for the work order lifecycle and its named transitions

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::{ClientId, Currency, Money, ProductId, TechnicianId};
use domain_workorder::{
    can_transition, mark_invoiced, MaterialUsage, Priority, ServiceCategory, TimeEntry,
    WorkOrder, WorkOrderError, WorkOrderStatus,
};

fn new_work_order() -> WorkOrder {
    WorkOrder::new(
        ClientId::new_v7(),
        ServiceCategory::new("hvac"),
        "Annual boiler service",
        Priority::Normal,
    )
}

fn completed_work_order() -> WorkOrder {
    let mut wo = new_work_order();
    wo.schedule(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(), None)
        .unwrap();
    wo.start().unwrap();
    wo.complete(Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, 0).unwrap())
        .unwrap();
    wo
}

// ============================================================================
// mark_invoiced
// ============================================================================

mod mark_invoiced_tests {
    use super::*;

    #[test]
    fn test_mark_invoiced_from_completed() {
        let invoiced = mark_invoiced(completed_work_order()).unwrap();
        assert_eq!(invoiced.status(), WorkOrderStatus::Invoiced);
        assert!(invoiced.is_terminal());
    }

    #[test]
    fn test_mark_invoiced_rejects_every_other_state() {
        let mut requested = new_work_order();
        assert!(matches!(
            mark_invoiced(requested.clone()),
            Err(WorkOrderError::InvalidState {
                from: WorkOrderStatus::Requested,
                to: WorkOrderStatus::Invoiced
            })
        ));

        requested.start().unwrap();
        assert!(mark_invoiced(requested.clone()).is_err());

        requested.hold().unwrap();
        assert!(mark_invoiced(requested.clone()).is_err());

        requested.cancel().unwrap();
        assert!(mark_invoiced(requested).is_err());
    }

    #[test]
    fn test_mark_invoiced_twice_fails() {
        let invoiced = mark_invoiced(completed_work_order()).unwrap();
        assert!(mark_invoiced(invoiced).is_err());
    }

    #[test]
    fn test_invoiced_work_order_rejects_billable_changes() {
        let mut invoiced = mark_invoiced(completed_work_order()).unwrap();

        let entry = TimeEntry::new(
            TechnicianId::new(),
            dec!(1.5),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            invoiced.log_time(entry),
            Err(WorkOrderError::TerminalState(WorkOrderStatus::Invoiced))
        ));

        let usage = MaterialUsage::new(
            ProductId::new(),
            "Filter",
            Money::new(dec!(12.00), Currency::USD),
            dec!(1),
        )
        .unwrap();
        assert!(invoiced.add_material(usage).is_err());
        assert!(invoiced.cancel().is_err());
    }
}

// ============================================================================
// Named transitions
// ============================================================================

mod transition_tests {
    use super::*;

    #[test]
    fn test_complete_stamps_time() {
        let wo = completed_work_order();
        assert_eq!(wo.status(), WorkOrderStatus::Completed);
        assert_eq!(
            wo.completed_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_completed_can_be_reopened_by_staff() {
        let mut wo = completed_work_order();
        wo.start().unwrap();
        assert_eq!(wo.status(), WorkOrderStatus::InProgress);
    }

    #[test]
    fn test_same_state_transition_is_rejected() {
        let mut wo = new_work_order();
        wo.start().unwrap();
        assert!(matches!(
            wo.start(),
            Err(WorkOrderError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_total_hours_sums_entries() {
        let mut wo = new_work_order();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        for hours in [dec!(1.25), dec!(2), dec!(0.25)] {
            wo.log_time(TimeEntry::new(TechnicianId::new(), hours, date).unwrap())
                .unwrap();
        }
        assert_eq!(wo.total_hours(), dec!(3.5));
    }
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn status() -> impl Strategy<Value = WorkOrderStatus> {
        proptest::sample::select(WorkOrderStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn nothing_leaves_a_terminal_state(from in status(), to in status()) {
            if from.is_terminal() {
                prop_assert!(!can_transition(from, to));
            }
        }

        #[test]
        fn invoiced_requires_completed(from in status()) {
            prop_assert_eq!(
                can_transition(from, WorkOrderStatus::Invoiced),
                from == WorkOrderStatus::Completed
            );
        }

        #[test]
        fn cancel_allowed_from_non_terminal(from in status()) {
            prop_assert_eq!(
                can_transition(from, WorkOrderStatus::Cancelled),
                !from.is_terminal()
            );
        }
    }
}
