//! Property-based tests for InvoiceBuilder.
//!
//! - A fresh invoice owes exactly its total: `balance = total`, `paid = 0`
//! - Lines are numbered 1..=n without gaps
//! - A prorated charge never exceeds its full-period amount

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use leasebill_shared::types::{LeaseId, OrganizationId, RecurringChargeId};

use super::builder::{BuildOutcome, BuildRequest, InvoiceBuilder};
use super::types::{InvoiceKind, InvoiceStatus, LineSource};
use crate::lease::{
    ChargeFrequency, ChargeType, Lease, LeaseBillingSetting, LeaseRecurringCharge, LeaseStatus,
};
use crate::period::BillingPeriod;
use crate::proration::ProrationMethod;

/// Strategy for amounts from 0.01 to 100,000.00.
fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for tax rates from 0.00% to 28.00%.
fn tax_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=2_800).prop_map(|bp| Decimal::new(bp, 2))
}

fn method() -> impl Strategy<Value = ProrationMethod> {
    prop_oneof![
        Just(ProrationMethod::ActualDaysInMonth),
        Just(ProrationMethod::FixedThirtyDayMonth),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_new_invoice_balance_equals_total(
        charges in prop::collection::vec((amount(), tax_rate()), 1..6),
        move_in_day in 1u32..=31,
        method in method(),
    ) {
        let period = BillingPeriod::calendar_month(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()).unwrap();
        let lease = Lease {
            id: LeaseId::new(),
            organization_id: OrganizationId::new(),
            unit_ref: "B-2".to_string(),
            tenant_ref: "T-9".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 3, move_in_day).unwrap(),
            end_date: None,
            status: LeaseStatus::Active,
            deleted_at: None,
        };
        let settings = LeaseBillingSetting {
            lease_id: lease.id,
            billing_day: 1,
            payment_term_days: Some(5),
            proration_method: method,
            auto_generate: true,
        };
        let templates: Vec<LeaseRecurringCharge> = charges
            .iter()
            .map(|(amount, tax)| LeaseRecurringCharge {
                id: RecurringChargeId::new(),
                lease_id: lease.id,
                charge_type: ChargeType::Rent,
                description: "Rent".to_string(),
                amount: *amount,
                frequency: ChargeFrequency::Monthly,
                start_date: lease.start_date,
                end_date: None,
                tax_rate: *tax,
                is_active: true,
                deleted_at: None,
            })
            .collect();

        let request = BuildRequest {
            lease: &lease,
            settings: Some(&settings),
            kind: InvoiceKind::Regular,
            period,
            invoice_date: period.start,
            recurring_charges: &templates,
            statements: &[],
            adjustments: &[],
            existing_invoices: &[],
            default_payment_term_days: 7,
        };

        match InvoiceBuilder::build(&request) {
            Ok(BuildOutcome::New(draft)) => {
                let invoice = draft.into_invoice("INV-000001".to_string(), Utc::now());
                prop_assert_eq!(invoice.status, InvoiceStatus::Draft);
                prop_assert_eq!(invoice.paid_amount, Decimal::ZERO);
                prop_assert_eq!(invoice.balance_amount, invoice.total_amount);
                prop_assert_eq!(invoice.total_amount, invoice.subtotal + invoice.tax_amount);

                for (index, line) in invoice.lines.iter().enumerate() {
                    prop_assert_eq!(line.line_number as usize, index + 1);
                    let LineSource::RecurringCharge(id) = line.source else {
                        return Err(TestCaseError::fail("unexpected line source"));
                    };
                    let template = templates.iter().find(|t| t.id == id).unwrap();
                    prop_assert!(line.line_amount <= template.amount);
                }
            }
            Ok(BuildOutcome::Existing(_)) => prop_assert!(false, "no invoices existed"),
            // FixedThirtyDayMonth can price a one-day tail at zero.
            Err(e) => prop_assert_eq!(e.error_code(), "NOTHING_TO_INVOICE"),
        }
    }
}
