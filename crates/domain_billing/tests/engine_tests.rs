//! Billing engine tests over the in-memory store

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use core_kernel::{
    BillingPeriod, ClientId, ContractId, Currency, DomainPort, FixedClock, InvoiceId, Money,
    PortError, ProductId, TechnicianId, WorkOrderId,
};
use domain_billing::{
    BillingConfig, BillingEngine, BillingError, BillingStore, Contract, ContractRate, Invoice,
    InvoiceSequence, InvoiceStatus, MemoryStore, NewPayment, Payment, PaymentMethod,
};
use domain_workorder::{
    MaterialUsage, Priority, ServiceCategory, TimeEntry, WorkOrder, WorkOrderPort,
    WorkOrderStatus,
};

fn usd(amount: Decimal) -> Money {
    Money::new(amount, Currency::USD)
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap(),
    ))
}

fn engine_with(store: &MemoryStore, clock: Arc<FixedClock>, config: BillingConfig) -> BillingEngine {
    let store = Arc::new(store.clone());
    BillingEngine::new(store.clone(), store.clone(), store, clock, config)
}

fn engine(store: &MemoryStore) -> BillingEngine {
    engine_with(store, clock(), BillingConfig::default())
}

fn completed(mut wo: WorkOrder) -> WorkOrder {
    wo.start().unwrap();
    wo.complete(Utc.with_ymd_and_hms(2024, 3, 14, 16, 0, 0).unwrap())
        .unwrap();
    wo
}

fn billable_work_order() -> WorkOrder {
    let mut wo = WorkOrder::new(
        ClientId::new(),
        ServiceCategory::new("plumbing"),
        "Burst pipe",
        Priority::Normal,
    );
    let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
    wo.log_time(TimeEntry::new(TechnicianId::new(), dec!(3.5), date).unwrap())
        .unwrap();
    wo.add_material(
        MaterialUsage::new(ProductId::new(), "Copper fitting", usd(dec!(25.00)), dec!(2)).unwrap(),
    )
    .unwrap();
    wo
}

async fn seed(store: &MemoryStore, wo: WorkOrder) -> WorkOrderId {
    store.create_work_order(&wo).await.unwrap().id
}

async fn seed_with_contract(store: &MemoryStore) -> WorkOrderId {
    let contract = Contract::new(ClientId::new(), "Plumbing maintenance")
        .with_discount_percent(dec!(10))
        .with_payment_terms(14)
        .with_rate(ContractRate::new(ServiceCategory::new("plumbing"), usd(dec!(50.00))));
    let wo = completed(billable_work_order().with_contract(contract.id));
    store.insert_contract(contract).await;
    seed(store, wo).await
}

// ============================================================================
// generate_invoice
// ============================================================================

mod generate_invoice {
    use super::*;

    #[tokio::test]
    async fn test_invoices_completed_work_order() {
        let store = MemoryStore::new();
        let wo_id = seed_with_contract(&store).await;

        let invoice = engine(&store).generate_invoice(wo_id).await.unwrap();

        assert_eq!(invoice.invoice_number, "INV-202403-0001");
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.total_amount, usd(dec!(238.95)));
        assert_eq!(invoice.issue_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2024, 3, 29).unwrap());
        assert_eq!(invoice.line_items.len(), 2);

        let wo = store.get_work_order(wo_id).await.unwrap();
        assert_eq!(wo.status(), WorkOrderStatus::Invoiced);
    }

    #[tokio::test]
    async fn test_default_payment_terms_without_contract() {
        let store = MemoryStore::new();
        let wo = WorkOrder::new(ClientId::new(), ServiceCategory::new("general"), "Inspection", Priority::Low)
            .with_budget(usd(dec!(300.00)));
        let wo_id = seed(&store, completed(wo)).await;

        let invoice = engine(&store).generate_invoice(wo_id).await.unwrap();
        assert_eq!(invoice.total_amount, usd(dec!(354.00)));
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2024, 4, 14).unwrap());
        assert!(invoice.contract_id.is_none());
    }

    #[tokio::test]
    async fn test_rejects_work_orders_that_are_not_completed() {
        let store = MemoryStore::new();
        let engine = engine(&store);

        let requested = billable_work_order();
        let mut scheduled = billable_work_order();
        scheduled
            .schedule(Utc.with_ymd_and_hms(2024, 3, 20, 9, 0, 0).unwrap(), None)
            .unwrap();
        let mut in_progress = billable_work_order();
        in_progress.start().unwrap();
        let mut pending = billable_work_order();
        pending.hold().unwrap();
        let mut cancelled = billable_work_order();
        cancelled.cancel().unwrap();

        for wo in [requested, scheduled, in_progress, pending, cancelled] {
            let status = wo.status();
            let id = seed(&store, wo).await;
            let result = engine.generate_invoice(id).await;
            assert!(matches!(result, Err(BillingError::InvalidState(_))), "{}", status);
            assert_eq!(store.get_work_order(id).await.unwrap().status(), status);
        }
        assert_eq!(store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn test_second_call_is_duplicate() {
        let store = MemoryStore::new();
        let wo_id = seed_with_contract(&store).await;
        let engine = engine(&store);

        engine.generate_invoice(wo_id).await.unwrap();
        let second = engine.generate_invoice(wo_id).await;

        assert!(matches!(second, Err(BillingError::DuplicateInvoice(id)) if id == wo_id));
        assert_eq!(store.invoice_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_produce_one_invoice() {
        let store = MemoryStore::new();
        let wo_id = seed_with_contract(&store).await;
        let engine = engine(&store);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.generate_invoice(wo_id).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(BillingError::DuplicateInvoice(_)) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.invoice_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_work_order_and_contract() {
        let store = MemoryStore::new();
        let engine = engine(&store);

        let missing = engine.generate_invoice(WorkOrderId::new()).await;
        assert!(matches!(missing, Err(BillingError::NotFound { .. })));

        let orphan = completed(billable_work_order().with_contract(core_kernel::ContractId::new()));
        let id = seed(&store, orphan).await;
        let result = engine.generate_invoice(id).await;
        assert!(matches!(result, Err(BillingError::NotFound { entity, .. }) if entity == "Contract"));
    }

    #[tokio::test]
    async fn test_nothing_billable_leaves_work_order_completed() {
        let store = MemoryStore::new();
        let wo = WorkOrder::new(ClientId::new(), ServiceCategory::new("hvac"), "Advice call", Priority::Normal);
        let id = seed(&store, completed(wo)).await;

        let result = engine(&store).generate_invoice(id).await;
        assert!(matches!(result, Err(BillingError::MissingData(_))));
        assert_eq!(store.get_work_order(id).await.unwrap().status(), WorkOrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_invoice_for_work_order() {
        let store = MemoryStore::new();
        let wo_id = seed_with_contract(&store).await;
        let engine = engine(&store);

        assert!(matches!(
            engine.invoice_for_work_order(wo_id).await,
            Err(BillingError::NotFound { .. })
        ));
        let invoice = engine.generate_invoice(wo_id).await.unwrap();
        assert_eq!(engine.invoice_for_work_order(wo_id).await.unwrap().id, invoice.id);
    }
}

// ============================================================================
// Numbering
// ============================================================================

mod numbering {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_invoices_get_unique_sequential_numbers() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for _ in 0..60 {
            ids.push(seed(&store, completed(billable_work_order())).await);
        }
        let engine = engine(&store);

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.generate_invoice(id).await })
            })
            .collect();

        let mut numbers = HashSet::new();
        for handle in handles {
            let invoice = handle.await.unwrap().unwrap();
            assert!(numbers.insert(invoice.invoice_number));
        }

        let expected: HashSet<String> = (1..=60).map(|n| format!("INV-202403-{:04}", n)).collect();
        assert_eq!(numbers, expected);
    }

    #[tokio::test]
    async fn test_period_follows_billing_timezone() {
        let store = MemoryStore::new();
        let id = seed(&store, completed(billable_work_order())).await;

        // 02:00 UTC on 1 April is still 31 March in New York
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 2, 0, 0).unwrap()));
        let config = BillingConfig {
            timezone: "America/New_York".parse().unwrap(),
            ..BillingConfig::default()
        };
        let invoice = engine_with(&store, clock, config).generate_invoice(id).await.unwrap();

        assert_eq!(invoice.invoice_number, "INV-202403-0001");
        assert_eq!(invoice.issue_date, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    }

    #[tokio::test]
    async fn test_collision_is_retried_with_next_number() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let first = seed(&store, completed(billable_work_order())).await;
        let second = seed(&store, completed(billable_work_order())).await;

        engine.generate_invoice(first).await.unwrap();
        store.set_sequence(BillingPeriod::new(2024, 3).unwrap(), 0).await;

        let invoice = engine.generate_invoice(second).await.unwrap();
        assert_eq!(invoice.invoice_number, "INV-202403-0002");
    }

    /// A sequence stuck on one value
    struct StuckSequence;

    impl DomainPort for StuckSequence {}

    #[async_trait]
    impl InvoiceSequence for StuckSequence {
        async fn next_value(&self, _period: BillingPeriod) -> Result<u32, PortError> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_allocation_gives_up_after_bounded_attempts() {
        let store = MemoryStore::new();
        let shared = Arc::new(store.clone());
        let engine = BillingEngine::new(
            shared.clone(),
            shared,
            Arc::new(StuckSequence),
            clock(),
            BillingConfig::default(),
        );
        let first = seed(&store, completed(billable_work_order())).await;
        let second = seed(&store, completed(billable_work_order())).await;

        engine.generate_invoice(first).await.unwrap();
        let result = engine.generate_invoice(second).await;

        assert!(matches!(
            result,
            Err(BillingError::NumberAllocationExhausted { attempts: 5, .. })
        ));
        assert_eq!(store.invoice_count().await, 1);
        assert_eq!(
            store.get_work_order(second).await.unwrap().status(),
            WorkOrderStatus::Completed
        );
    }
}

// ============================================================================
// Payments
// ============================================================================

mod payments {
    use super::*;

    async fn invoiced(store: &MemoryStore, engine: &BillingEngine) -> InvoiceId {
        let wo_id = seed_with_contract(store).await;
        engine.generate_invoice(wo_id).await.unwrap().id
    }

    #[tokio::test]
    async fn test_partial_then_full_payment() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let id = invoiced(&store, &engine).await;
        engine.mark_invoice_sent(id).await.unwrap();

        let invoice = engine
            .record_payment(id, NewPayment::new(usd(dec!(100.00)), PaymentMethod::Cash))
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.balance_due().unwrap(), usd(dec!(138.95)));

        let invoice = engine
            .record_payment(
                id,
                NewPayment::new(usd(dec!(138.95)), PaymentMethod::BankTransfer).with_reference("TRX-1"),
            )
            .await
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.payments.len(), 2);
        assert_eq!(invoice.payments[1].reference.as_deref(), Some("TRX-1"));
    }

    #[tokio::test]
    async fn test_overpayment_leaves_invoice_untouched() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let id = invoiced(&store, &engine).await;
        let before = engine.get_invoice(id).await.unwrap();

        let result = engine
            .record_payment(id, NewPayment::new(usd(dec!(238.96)), PaymentMethod::Cash))
            .await;

        assert!(matches!(result, Err(BillingError::Overpayment { .. })));
        assert_eq!(engine.get_invoice(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_unknown_invoice() {
        let store = MemoryStore::new();
        let result = engine(&store)
            .record_payment(InvoiceId::new(), NewPayment::new(usd(dec!(1)), PaymentMethod::Cash))
            .await;
        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_payments_are_all_retained() {
        let store = MemoryStore::new();
        let config = BillingConfig {
            max_payment_attempts: 20,
            ..BillingConfig::default()
        };
        let engine = engine_with(&store, clock(), config);
        let id = invoiced(&store, &engine).await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .record_payment(id, NewPayment::new(usd(dec!(10.00)), PaymentMethod::CreditCard))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let invoice = engine.get_invoice(id).await.unwrap();
        assert_eq!(invoice.payments.len(), 10);
        assert_eq!(invoice.total_paid().unwrap(), usd(dec!(100.00)));
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.version, 11);
    }
}

// ============================================================================
// Sending and overdue status
// ============================================================================

mod sending {
    use super::*;

    #[tokio::test]
    async fn test_mark_sent_is_idempotent() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let wo_id = seed_with_contract(&store).await;
        let id = engine.generate_invoice(wo_id).await.unwrap().id;

        engine.mark_invoice_sent(id).await.unwrap();
        engine.mark_invoice_sent(id).await.unwrap();

        let invoice = store.get_invoice(id).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert_eq!(invoice.version, 2);
    }

    #[tokio::test]
    async fn test_paid_invoice_cannot_be_sent() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        let wo_id = seed_with_contract(&store).await;
        let id = engine.generate_invoice(wo_id).await.unwrap().id;
        engine
            .record_payment(id, NewPayment::new(usd(dec!(238.95)), PaymentMethod::Cash))
            .await
            .unwrap();

        assert!(matches!(
            engine.mark_invoice_sent(id).await,
            Err(BillingError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_sent_invoice_becomes_overdue() {
        let store = MemoryStore::new();
        let clock = clock();
        let engine = engine_with(&store, clock.clone(), BillingConfig::default());
        let wo_id = seed_with_contract(&store).await;
        let id = engine.generate_invoice(wo_id).await.unwrap().id;
        engine.mark_invoice_sent(id).await.unwrap();

        let invoice = engine.get_invoice(id).await.unwrap();
        assert_eq!(invoice.effective_status(engine.today()), InvoiceStatus::Sent);

        clock.set(Utc.with_ymd_and_hms(2024, 3, 30, 9, 0, 0).unwrap());
        assert_eq!(invoice.effective_status(engine.today()), InvoiceStatus::Overdue);
    }

    /// Rejects the first `conflicts` status updates as stale
    struct ContendedStore {
        inner: MemoryStore,
        conflicts: AtomicU32,
    }

    impl DomainPort for ContendedStore {}

    #[async_trait]
    impl BillingStore for ContendedStore {
        async fn get_contract(&self, id: ContractId) -> Result<Contract, PortError> {
            self.inner.get_contract(id).await
        }

        async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
            self.inner.get_invoice(id).await
        }

        async fn find_invoice_by_work_order(
            &self,
            work_order_id: WorkOrderId,
        ) -> Result<Option<Invoice>, PortError> {
            self.inner.find_invoice_by_work_order(work_order_id).await
        }

        async fn commit_invoice(
            &self,
            invoice: &Invoice,
            work_order: &WorkOrder,
        ) -> Result<Invoice, PortError> {
            self.inner.commit_invoice(invoice, work_order).await
        }

        async fn append_payment(
            &self,
            invoice: &Invoice,
            payment: &Payment,
        ) -> Result<Invoice, PortError> {
            self.inner.append_payment(invoice, payment).await
        }

        async fn update_invoice_status(&self, invoice: &Invoice) -> Result<Invoice, PortError> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(PortError::conflict(format!(
                    "invoice {} changed since version {}",
                    invoice.id, invoice.version
                )));
            }
            self.inner.update_invoice_status(invoice).await
        }
    }

    async fn contended_engine(store: &MemoryStore, conflicts: u32) -> (BillingEngine, InvoiceId) {
        let id = engine(store)
            .generate_invoice(seed_with_contract(store).await)
            .await
            .unwrap()
            .id;
        let contended = Arc::new(ContendedStore {
            inner: store.clone(),
            conflicts: AtomicU32::new(conflicts),
        });
        let shared = Arc::new(store.clone());
        let engine = BillingEngine::new(
            shared.clone(),
            contended,
            shared,
            clock(),
            BillingConfig::default(),
        );
        (engine, id)
    }

    #[tokio::test]
    async fn test_mark_sent_retries_after_version_conflict() {
        let store = MemoryStore::new();
        let (engine, id) = contended_engine(&store, 2).await;

        engine.mark_invoice_sent(id).await.unwrap();

        let invoice = store.get_invoice(id).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert_eq!(invoice.version, 2);
    }

    #[tokio::test]
    async fn test_mark_sent_gives_up_after_bounded_attempts() {
        let store = MemoryStore::new();
        let (engine, id) = contended_engine(&store, u32::MAX).await;

        let result = engine.mark_invoice_sent(id).await;

        assert!(matches!(result, Err(BillingError::ConcurrentModification(_))));
        assert_eq!(store.get_invoice(id).await.unwrap().status, InvoiceStatus::Draft);
    }
}
