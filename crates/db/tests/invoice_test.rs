//! Integration tests for invoice generation, issue, void and overdue marking.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;

use common::{Fixture, date};
use leasebill_core::invoice::{AdjustmentKind, InvoiceStatus, ManualAdjustment};
use leasebill_core::ErrorKind;
use leasebill_db::repositories::{InvoiceFilter, InvoiceRepository};
use leasebill_db::{GenerateInvoiceCommand, InvoiceService, InMemoryStore};

fn service(fx: &Fixture) -> InvoiceService<InMemoryStore> {
    InvoiceService::new(Arc::clone(&fx.store), &fx.config)
}

fn april() -> (chrono::NaiveDate, Option<chrono::NaiveDate>) {
    (date(2026, 4, 1), Some(date(2026, 4, 30)))
}

#[tokio::test]
async fn test_first_month_is_prorated_from_lease_start() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 4, 16), dec!(12000)).await;
    let (start, end) = april();

    let generated = service(&fx)
        .generate_invoice(
            GenerateInvoiceCommand::regular(lease.id)
                .for_period(start, end)
                .dated(date(2026, 4, 1)),
        )
        .await
        .unwrap();

    let invoice = generated.invoice;
    assert!(generated.created);
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.invoice_number, "INV-000001");
    assert_eq!(invoice.lines.len(), 1);
    assert_eq!(invoice.lines[0].line_amount, dec!(6000.00));
    assert_eq!(invoice.lines[0].description, "Monthly rent (15/30 days)");
    assert_eq!(invoice.total_amount, dec!(6000.00));
    assert_eq!(invoice.balance_amount, dec!(6000.00));
    assert_eq!(invoice.due_date, date(2026, 4, 11));
}

#[tokio::test]
async fn test_generate_returns_existing_draft() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let service = service(&fx);
    let (start, end) = april();

    let first = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap();
    let second = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.invoice.id, second.invoice.id);
    assert_eq!(fx.store.list_invoices_by_lease(lease.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_generate_after_issue_is_duplicate() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let service = service(&fx);
    let (start, end) = april();

    let draft = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap()
        .invoice;
    service.issue_invoice(draft.id, draft.version).await.unwrap();

    let err = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_INVOICE");
}

#[tokio::test]
async fn test_voided_period_can_be_regenerated() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let service = service(&fx);
    let (start, end) = april();

    let draft = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap()
        .invoice;
    let voided = service
        .void_invoice(draft.id, draft.version, "Wrong tenant")
        .await
        .unwrap();
    assert_eq!(voided.status, InvoiceStatus::Void);
    assert_eq!(voided.balance_amount, dec!(0));

    let regenerated = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap();
    assert!(regenerated.created);
    assert_ne!(regenerated.invoice.id, draft.id);
    assert_eq!(regenerated.invoice.invoice_number, "INV-000002");
}

#[tokio::test]
async fn test_missing_settings_and_unknown_lease() {
    let fx = Fixture::new();
    let lease = fx.lease(date(2026, 1, 1)).await;
    fx.monthly_rent(&lease, dec!(12000)).await;
    let service = service(&fx);
    let (start, end) = april();

    let err = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "MISSING_BILLING_SETTINGS");

    let err = service
        .generate_invoice(
            GenerateInvoiceCommand::regular(leasebill_shared::types::LeaseId::new())
                .for_period(start, end),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_period_defaults_to_billing_cycle_containing_end() {
    let fx = Fixture::new();
    let lease = fx.lease(date(2026, 1, 1)).await;
    fx.settings(lease.id, 5).await;
    fx.monthly_rent(&lease, dec!(9000)).await;

    let mut command = GenerateInvoiceCommand::regular(lease.id);
    command.period_end = Some(date(2026, 4, 20));
    let invoice = service(&fx)
        .generate_invoice(command)
        .await
        .unwrap()
        .invoice;

    assert_eq!(invoice.period.start, date(2026, 4, 5));
    assert_eq!(invoice.period.end, date(2026, 5, 4));
    assert_eq!(invoice.total_amount, dec!(9000.00));
}

#[tokio::test]
async fn test_manual_discount_reduces_total() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let (start, end) = april();

    let invoice = service(&fx)
        .generate_invoice(
            GenerateInvoiceCommand::regular(lease.id)
                .for_period(start, end)
                .with_adjustment(ManualAdjustment {
                    kind: AdjustmentKind::Discount,
                    description: "Loyalty discount".to_string(),
                    amount: dec!(500),
                    tax_rate: dec!(0),
                }),
        )
        .await
        .unwrap()
        .invoice;

    assert_eq!(invoice.lines.len(), 2);
    assert_eq!(invoice.total_amount, dec!(11500.00));
}

#[tokio::test]
async fn test_issue_with_stale_version_conflicts() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let service = service(&fx);
    let (start, end) = april();

    let draft = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap()
        .invoice;
    let issued = service.issue_invoice(draft.id, draft.version).await.unwrap();
    assert_eq!(issued.status, InvoiceStatus::Issued);
    assert_eq!(issued.version, draft.version + 1);

    let err = service
        .void_invoice(draft.id, draft.version, "Duplicate")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONCURRENCY_CONFLICT");

    let stored = service.get_invoice(draft.id).await.unwrap();
    assert_eq!(stored.status, InvoiceStatus::Issued);
}

#[tokio::test]
async fn test_void_requires_reason() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let service = service(&fx);
    let (start, end) = april();

    let draft = service
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap()
        .invoice;
    let err = service
        .void_invoice(draft.id, draft.version, "  ")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VOID_REASON_REQUIRED");
}

#[tokio::test]
async fn test_mark_overdue_moves_past_due_invoices_once() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let service = service(&fx);
    let (start, end) = april();

    let draft = service
        .generate_invoice(
            GenerateInvoiceCommand::regular(lease.id)
                .for_period(start, end)
                .dated(date(2026, 4, 1)),
        )
        .await
        .unwrap()
        .invoice;
    service.issue_invoice(draft.id, draft.version).await.unwrap();

    let on_due_date = service
        .mark_overdue(fx.organization_id, date(2026, 4, 11))
        .await
        .unwrap();
    assert!(on_due_date.marked.is_empty());

    let result = service
        .mark_overdue(fx.organization_id, date(2026, 4, 20))
        .await
        .unwrap();
    assert_eq!(result.marked, vec![draft.id]);
    assert!(result.failed.is_empty());
    assert_eq!(
        service.get_invoice(draft.id).await.unwrap().status,
        InvoiceStatus::Overdue
    );

    let again = service
        .mark_overdue(fx.organization_id, date(2026, 4, 21))
        .await
        .unwrap();
    assert!(again.marked.is_empty());
}

#[tokio::test]
async fn test_transient_write_fault_is_retried() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let (start, end) = april();
    fx.store.fail_invoice_writes(2);

    let generated = service(&fx)
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap();

    assert!(generated.created);
    // Numbers drawn by failed attempts are not reused.
    assert_eq!(generated.invoice.invoice_number, "INV-000003");
    let stored = fx
        .store
        .list_invoices_by_org(fx.organization_id, InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_persistent_fault_surfaces_as_infrastructure() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(12000)).await;
    let (start, end) = april();
    fx.store.fail_invoice_writes(u32::MAX);

    let err = service(&fx)
        .generate_invoice(GenerateInvoiceCommand::regular(lease.id).for_period(start, end))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert!(err.is_transient());
    fx.store.clear_faults();
    assert!(fx.store.list_invoices_by_lease(lease.id).await.unwrap().is_empty());
}
