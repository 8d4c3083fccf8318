//! Property-based tests for PaymentLedger.
//!
//! - `balance = total - paid` and `balance >= 0` after any sequence of
//!   payments, reversals and credits
//! - paid never exceeds total by more than the tolerance
//! - a rejected operation leaves the invoice untouched

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use leasebill_shared::types::{LeaseId, OrganizationId, RecurringChargeId};

use super::credit_note::CreditLineRequest;
use super::ledger::PaymentLedger;
use crate::invoice::{Invoice, InvoiceKind, InvoiceLine, InvoiceStatus, LineSource};
use crate::lease::ChargeType;
use crate::period::BillingPeriod;

#[derive(Debug, Clone)]
enum Op {
    Pay(Decimal),
    Reverse(Decimal),
    Credit(usize, Decimal),
}

/// Strategy for money amounts from 0.01 to 20,000.00.
fn money() -> impl Strategy<Value = Decimal> {
    (1i64..2_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => money().prop_map(Op::Pay),
        1 => money().prop_map(Op::Reverse),
        1 => (0usize..4, money()).prop_map(|(i, a)| Op::Credit(i, a)),
    ]
}

fn issued_invoice(line_amounts: &[Decimal], tax_rate: Decimal) -> Invoice {
    let lines = line_amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| {
            InvoiceLine::new(
                u32::try_from(i + 1).unwrap(),
                ChargeType::Rent,
                "Rent",
                LineSource::RecurringCharge(RecurringChargeId::new()),
                *amount,
                tax_rate,
            )
        })
        .collect();
    let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    let mut invoice = Invoice::new(
        OrganizationId::new(),
        LeaseId::new(),
        "INV-000042".to_string(),
        InvoiceKind::Regular,
        date,
        date,
        BillingPeriod::calendar_month(date).unwrap(),
        lines,
        Utc::now(),
    );
    invoice.issue(Utc::now()).unwrap();
    invoice
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_balance_invariant_holds(
        line_amounts in prop::collection::vec(money(), 1..4),
        tax_bp in 0i64..=2_800,
        tolerance_cents in 0i64..100,
        ops in prop::collection::vec(op(), 1..25),
    ) {
        let tolerance = Decimal::new(tolerance_cents, 2);
        let mut invoice = issued_invoice(&line_amounts, Decimal::new(tax_bp, 2));

        for op in ops {
            let before = invoice.clone();
            let result = match op {
                Op::Pay(amount) => {
                    PaymentLedger::apply_payment(&mut invoice, amount, tolerance, Utc::now()).map(|_| ())
                }
                Op::Reverse(amount) => {
                    PaymentLedger::reverse_payment(&mut invoice, amount, Utc::now()).map(|_| ())
                }
                Op::Credit(index, amount) => {
                    let line_id = invoice.lines[index % invoice.lines.len()].id;
                    PaymentLedger::apply_credit(
                        &mut invoice,
                        &[CreditLineRequest { invoice_line_id: line_id, amount, description: None }],
                        Utc::now(),
                    )
                    .map(|_| ())
                }
            };

            if result.is_err() {
                prop_assert_eq!(invoice.paid_amount, before.paid_amount);
                prop_assert_eq!(invoice.total_amount, before.total_amount);
                prop_assert_eq!(invoice.status, before.status);
            }

            prop_assert!(invoice.balance_amount >= Decimal::ZERO);
            prop_assert_eq!(
                invoice.balance_amount,
                (invoice.total_amount - invoice.paid_amount).max(Decimal::ZERO)
            );
            prop_assert!(invoice.paid_amount - invoice.total_amount <= tolerance);
            prop_assert_eq!(
                invoice.status == InvoiceStatus::Paid,
                invoice.balance_amount.is_zero()
            );
        }
    }
}
