//! Unit tests for the strongly-typed identifiers

use core_kernel::{
    WorkOrderId, TimeEntryId, MaterialUsageId, TechnicianId, ProductId,
    ClientId, ContractId, InvoiceId, LineItemId, PaymentId,
};
use uuid::Uuid;

mod work_order_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = WorkOrderId::new();
        let id2 = WorkOrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = WorkOrderId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = WorkOrderId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_display_and_parse_round_trip() {
        let id = WorkOrderId::new_v7();
        let display = id.to_string();
        assert!(display.starts_with("WO-"));
        assert_eq!(display.parse::<WorkOrderId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("WO-not-a-uuid".parse::<WorkOrderId>().is_err());
    }
}

mod prefix_tests {
    use super::*;

    #[test]
    fn test_prefixes_are_distinct() {
        let prefixes = [
            WorkOrderId::prefix(),
            TimeEntryId::prefix(),
            MaterialUsageId::prefix(),
            TechnicianId::prefix(),
            ProductId::prefix(),
            ClientId::prefix(),
            ContractId::prefix(),
            InvoiceId::prefix(),
            LineItemId::prefix(),
            PaymentId::prefix(),
        ];

        let mut unique = prefixes.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), prefixes.len());
    }

    #[test]
    fn test_serde_is_transparent() {
        let uuid = Uuid::new_v4();
        let id = InvoiceId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}
