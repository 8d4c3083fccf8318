//! Integration tests for utility statements: readings, pricing and locking.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;

use common::{Fixture, date};
use leasebill_core::invoice::LineSource;
use leasebill_core::rating::UtilityType;
use leasebill_core::statement::{StatementStatus, UtilityStatement};
use leasebill_db::{
    CreateStatementCommand, GenerateInvoiceCommand, InMemoryStore, InvoiceService,
    StatementService,
};
use leasebill_shared::types::LeaseId;

fn statements(fx: &Fixture) -> StatementService<InMemoryStore> {
    StatementService::new(Arc::clone(&fx.store), &fx.config)
}

async fn march_statement(fx: &Fixture, lease_id: LeaseId, utility: UtilityType) -> UtilityStatement {
    statements(fx)
        .create_statement(CreateStatementCommand {
            lease_id,
            utility_type: utility,
            period_start: date(2026, 3, 1),
            period_end: date(2026, 3, 31),
            tax_rate: dec!(0),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_metered_statement_is_priced_by_slabs() {
    let fx = Fixture::new();
    let plan = fx.electricity_plan().await;
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(8000)).await;
    let service = statements(&fx);

    let draft = march_statement(&fx, lease.id, UtilityType::Electricity).await;
    assert_eq!(draft.status, StatementStatus::Draft);

    let read = service
        .record_readings(draft.id, draft.version, dec!(1000), dec!(1150))
        .await
        .unwrap();
    assert_eq!(read.consumption, Some(dec!(150)));

    let finalized = service
        .finalize_statement(read.id, read.version)
        .await
        .unwrap();

    // 100 units at 5.00 plus 50 units at 7.50.
    assert_eq!(finalized.status, StatementStatus::Finalized);
    assert_eq!(finalized.calculated_amount, Some(dec!(875.00)));
    assert_eq!(finalized.rate_plan_id, Some(plan.id));
    assert!(finalized.finalized_at.is_some());
}

#[tokio::test]
async fn test_direct_statement_keeps_entered_amount() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(8000)).await;
    let service = statements(&fx);

    let draft = march_statement(&fx, lease.id, UtilityType::Water).await;
    let entered = service
        .set_direct_amount(draft.id, draft.version, dec!(420.50))
        .await
        .unwrap();
    let finalized = service
        .finalize_statement(entered.id, entered.version)
        .await
        .unwrap();

    assert_eq!(finalized.calculated_amount, Some(dec!(420.50)));
    assert_eq!(finalized.rate_plan_id, None);
}

#[tokio::test]
async fn test_metered_statement_without_plan() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(8000)).await;
    let service = statements(&fx);

    let draft = march_statement(&fx, lease.id, UtilityType::Electricity).await;
    let read = service
        .record_readings(draft.id, draft.version, dec!(10), dec!(20))
        .await
        .unwrap();
    let err = service
        .finalize_statement(read.id, read.version)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "NO_RATE_PLAN");
    let stored = service.get_statement(read.id).await.unwrap();
    assert_eq!(stored.status, StatementStatus::Draft);
}

#[tokio::test]
async fn test_readings_must_not_decrease() {
    let fx = Fixture::new();
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(8000)).await;
    let draft = march_statement(&fx, lease.id, UtilityType::Electricity).await;

    let err = statements(&fx)
        .record_readings(draft.id, draft.version, dec!(500), dec!(499))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_READING");
}

#[tokio::test]
async fn test_finalized_statement_is_not_editable() {
    let fx = Fixture::new();
    fx.electricity_plan().await;
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(8000)).await;
    let service = statements(&fx);

    let draft = march_statement(&fx, lease.id, UtilityType::Electricity).await;
    let read = service
        .record_readings(draft.id, draft.version, dec!(0), dec!(40))
        .await
        .unwrap();
    let finalized = service
        .finalize_statement(read.id, read.version)
        .await
        .unwrap();

    let err = service
        .record_readings(finalized.id, finalized.version, dec!(0), dec!(60))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STATEMENT_NOT_EDITABLE");

    let err = service
        .record_readings(finalized.id, read.version, dec!(0), dec!(60))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONCURRENCY_CONFLICT");
}

#[tokio::test]
async fn test_billed_statement_is_locked_and_billed_once() {
    let fx = Fixture::new();
    fx.electricity_plan().await;
    let lease = fx.rented_lease(date(2026, 1, 1), dec!(8000)).await;
    let service = statements(&fx);

    let draft = march_statement(&fx, lease.id, UtilityType::Electricity).await;
    let read = service
        .record_readings(draft.id, draft.version, dec!(1000), dec!(1150))
        .await
        .unwrap();
    let finalized = service
        .finalize_statement(read.id, read.version)
        .await
        .unwrap();

    let invoices = InvoiceService::new(Arc::clone(&fx.store), &fx.config);
    let march = invoices
        .generate_invoice(
            GenerateInvoiceCommand::regular(lease.id)
                .for_period(date(2026, 3, 1), Some(date(2026, 3, 31))),
        )
        .await
        .unwrap()
        .invoice;

    assert_eq!(march.lines.len(), 2);
    assert!(march.bills_statement(finalized.id));
    assert!(
        march
            .lines
            .iter()
            .any(|l| l.source == LineSource::UtilityStatement(finalized.id))
    );
    assert_eq!(march.total_amount, dec!(8875.00));

    let err = service
        .set_direct_amount(finalized.id, finalized.version, dec!(1))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STATEMENT_LOCKED");
}
