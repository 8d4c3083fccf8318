//! Pure invoice assembly.
//!
//! `InvoiceBuilder::build` turns a lease, its settings, recurring charges,
//! finalized statements and manual adjustments into a Draft invoice for one
//! period. It performs no I/O: the caller loads every input and persists the
//! result.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;

use leasebill_shared::types::{LeaseId, OrganizationId};

use super::error::InvoiceError;
use super::types::{
    AdjustmentKind, Invoice, InvoiceKind, InvoiceLine, InvoiceStatus, LineSource, ManualAdjustment,
};
use crate::lease::{ChargeType, Lease, LeaseBillingSetting, LeaseRecurringCharge};
use crate::period::{BillingPeriod, PeriodError};
use crate::proration::ProrationCalculator;
use crate::statement::UtilityStatement;

/// Everything needed to build one invoice.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Lease being billed.
    pub lease: &'a Lease,
    /// The lease's billing settings, if any.
    pub settings: Option<&'a LeaseBillingSetting>,
    /// Regular or utility invoice.
    pub kind: InvoiceKind,
    /// Period billed.
    pub period: BillingPeriod,
    /// Document date.
    pub invoice_date: NaiveDate,
    /// The lease's recurring charges (ignored for utility invoices).
    pub recurring_charges: &'a [LeaseRecurringCharge],
    /// The lease's utility statements.
    pub statements: &'a [UtilityStatement],
    /// One-off lines.
    pub adjustments: &'a [ManualAdjustment],
    /// Every invoice already recorded for the lease.
    pub existing_invoices: &'a [Invoice],
    /// Payment term used when the settings leave it unset.
    pub default_payment_term_days: u32,
}

/// A validated invoice that has not been numbered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Lease billed.
    pub lease_id: LeaseId,
    /// Run family.
    pub kind: InvoiceKind,
    /// Period billed.
    pub period: BillingPeriod,
    /// Document date.
    pub invoice_date: NaiveDate,
    /// Payment due date.
    pub due_date: NaiveDate,
    /// Numbered lines.
    pub lines: Vec<InvoiceLine>,
}

impl InvoiceDraft {
    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|l| l.line_total).sum()
    }

    /// Turns the draft into a persisted-shape invoice with its number.
    #[must_use]
    pub fn into_invoice(self, invoice_number: String, now: DateTime<Utc>) -> Invoice {
        Invoice::new(
            self.organization_id,
            self.lease_id,
            invoice_number,
            self.kind,
            self.invoice_date,
            self.due_date,
            self.period,
            self.lines,
            now,
        )
    }
}

/// Result of a build.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// A Draft for the same lease, kind and period already exists; returned untouched.
    Existing(Invoice),
    /// A new invoice, still to be numbered and stored.
    New(InvoiceDraft),
}

/// Stateless invoice builder.
pub struct InvoiceBuilder;

impl InvoiceBuilder {
    /// Build one invoice for one lease and period.
    ///
    /// # Arguments
    ///
    /// * `request` - Lease, settings, inputs and existing invoices
    ///
    /// # Returns
    ///
    /// `BuildOutcome::Existing` when a Draft for the same period and kind is
    /// on record, `BuildOutcome::New` otherwise.
    ///
    /// # Errors
    ///
    /// * `DuplicateInvoice` - a non-draft, non-void invoice covers the period
    /// * `MissingBillingSettings` - the lease has no settings
    /// * `LeaseNotBillable` - the lease is not active during the period
    /// * `InvalidAdjustment` - a manual adjustment is malformed
    /// * `NothingToInvoice` - no line applies
    /// * `NegativeInvoiceTotal` - discounts exceed charges
    pub fn build(request: &BuildRequest<'_>) -> Result<BuildOutcome, InvoiceError> {
        let lease = request.lease;

        if let Some(existing) = Self::find_existing(request)? {
            return Ok(BuildOutcome::Existing(existing.clone()));
        }

        let settings = request
            .settings
            .ok_or(InvoiceError::MissingBillingSettings(lease.id))?;

        if !lease.is_billable_in(&request.period) {
            return Err(InvoiceError::LeaseNotBillable {
                lease_id: lease.id,
                period: request.period,
            });
        }

        for adjustment in request.adjustments {
            adjustment.validate()?;
        }

        let mut lines = Vec::new();
        if request.kind == InvoiceKind::Regular {
            Self::collect_recurring(request, settings, &mut lines)?;
        }
        Self::collect_statements(request, &mut lines);
        Self::collect_adjustments(request.adjustments, &mut lines);

        if lines.is_empty() {
            return Err(InvoiceError::NothingToInvoice {
                lease_id: lease.id,
                period: request.period,
            });
        }

        for (index, line) in lines.iter_mut().enumerate() {
            line.line_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
        }

        let draft = InvoiceDraft {
            organization_id: lease.organization_id,
            lease_id: lease.id,
            kind: request.kind,
            period: request.period,
            invoice_date: request.invoice_date,
            due_date: Self::due_date(request, settings)?,
            lines,
        };

        let total = draft.total();
        if total < Decimal::ZERO {
            return Err(InvoiceError::NegativeInvoiceTotal(total));
        }

        Ok(BuildOutcome::New(draft))
    }

    /// Draft of the same period and kind, or an error if a live non-draft one exists.
    fn find_existing<'a>(request: &BuildRequest<'a>) -> Result<Option<&'a Invoice>, InvoiceError> {
        let mut draft = None;
        for invoice in request.existing_invoices.iter().filter(|i| {
            i.deleted_at.is_none()
                && i.lease_id == request.lease.id
                && i.kind == request.kind
                && i.period == request.period
        }) {
            match invoice.status {
                InvoiceStatus::Draft => draft = Some(invoice),
                InvoiceStatus::Void => {}
                status => {
                    return Err(InvoiceError::DuplicateInvoice {
                        lease_id: request.lease.id,
                        kind: request.kind,
                        period: request.period,
                        status,
                        invoice_number: invoice.invoice_number.clone(),
                    });
                }
            }
        }
        Ok(draft)
    }

    fn collect_recurring(
        request: &BuildRequest<'_>,
        settings: &LeaseBillingSetting,
        lines: &mut Vec<InvoiceLine>,
    ) -> Result<(), InvoiceError> {
        let period = request.period;
        let lease = request.lease;

        for charge in request
            .recurring_charges
            .iter()
            .filter(|c| c.deleted_at.is_none() && c.is_active && c.lease_id == lease.id)
        {
            if !charge.is_proratable() {
                if charge.is_due_in(&period) {
                    lines.push(InvoiceLine::new(
                        0,
                        charge.charge_type,
                        charge.description.clone(),
                        LineSource::RecurringCharge(charge.id),
                        charge.amount,
                        charge.tax_rate,
                    ));
                }
                continue;
            }

            // Occupied window: lease term ∩ charge window ∩ period.
            let start = lease.start_date.max(charge.start_date);
            let end = match (lease.end_date, charge.end_date) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let Some(occupied) = period.intersect(start, end) else {
                continue;
            };

            let proration = ProrationCalculator::prorate(
                charge.amount,
                period.start,
                period.end,
                occupied.start,
                occupied.end,
                settings.proration_method,
            )?;
            if proration.amount.is_zero() {
                continue;
            }

            let description = if proration.is_full() {
                charge.description.clone()
            } else {
                format!(
                    "{} ({}/{} days)",
                    charge.description, proration.occupied_days, proration.period_days
                )
            };

            lines.push(InvoiceLine::new(
                0,
                charge.charge_type,
                description,
                LineSource::RecurringCharge(charge.id),
                proration.amount,
                charge.tax_rate,
            ));
        }
        Ok(())
    }

    fn collect_statements(request: &BuildRequest<'_>, lines: &mut Vec<InvoiceLine>) {
        let billed_elsewhere = |statement: &UtilityStatement| {
            request
                .existing_invoices
                .iter()
                .filter(|i| i.deleted_at.is_none() && i.status.is_live())
                .any(|i| i.bills_statement(statement.id))
        };

        for statement in request.statements.iter().filter(|s| {
            s.deleted_at.is_none()
                && s.lease_id == request.lease.id
                && request.period.contains(s.period.end)
        }) {
            let Some(amount) = statement.billable_amount() else {
                continue;
            };
            if billed_elsewhere(statement) {
                continue;
            }

            let description = match statement.consumption {
                Some(units) if statement.is_metered() => format!(
                    "{} {} units ({})",
                    statement.utility_type.label(),
                    units,
                    statement.period
                ),
                _ => format!("{} ({})", statement.utility_type.label(), statement.period),
            };

            lines.push(InvoiceLine::new(
                0,
                ChargeType::Utility,
                description,
                LineSource::UtilityStatement(statement.id),
                amount,
                statement.tax_rate,
            ));
        }
    }

    fn collect_adjustments(adjustments: &[ManualAdjustment], lines: &mut Vec<InvoiceLine>) {
        for adjustment in adjustments {
            let charge_type = match adjustment.kind {
                AdjustmentKind::Charge => ChargeType::Adjustment,
                AdjustmentKind::Discount => ChargeType::Discount,
            };
            lines.push(InvoiceLine::new(
                0,
                charge_type,
                adjustment.description.trim(),
                LineSource::Adjustment,
                adjustment.signed_amount(),
                adjustment.tax_rate,
            ));
        }
    }

    fn due_date(
        request: &BuildRequest<'_>,
        settings: &LeaseBillingSetting,
    ) -> Result<NaiveDate, InvoiceError> {
        let term = settings
            .payment_term_days
            .unwrap_or(request.default_payment_term_days);
        request
            .invoice_date
            .checked_add_days(Days::new(u64::from(term)))
            .ok_or(InvoiceError::Period(PeriodError::OutOfRange))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::{ChargeFrequency, LeaseStatus};
    use crate::proration::ProrationMethod;
    use crate::rating::UtilityType;
    use leasebill_shared::types::RecurringChargeId;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn april() -> BillingPeriod {
        BillingPeriod::calendar_month(d(2026, 4, 1)).unwrap()
    }

    fn lease(start: NaiveDate) -> Lease {
        Lease {
            id: LeaseId::new(),
            organization_id: OrganizationId::new(),
            unit_ref: "A-101".to_string(),
            tenant_ref: "T-1".to_string(),
            start_date: start,
            end_date: None,
            status: LeaseStatus::Active,
            deleted_at: None,
        }
    }

    fn settings(lease: &Lease) -> LeaseBillingSetting {
        LeaseBillingSetting {
            lease_id: lease.id,
            billing_day: 1,
            payment_term_days: Some(7),
            proration_method: ProrationMethod::ActualDaysInMonth,
            auto_generate: true,
        }
    }

    fn rent(lease: &Lease, amount: Decimal, tax: Decimal) -> LeaseRecurringCharge {
        LeaseRecurringCharge {
            id: RecurringChargeId::new(),
            lease_id: lease.id,
            charge_type: ChargeType::Rent,
            description: "Monthly rent".to_string(),
            amount,
            frequency: ChargeFrequency::Monthly,
            start_date: lease.start_date,
            end_date: None,
            tax_rate: tax,
            is_active: true,
            deleted_at: None,
        }
    }

    fn request<'a>(
        lease: &'a Lease,
        settings: Option<&'a LeaseBillingSetting>,
        charges: &'a [LeaseRecurringCharge],
    ) -> BuildRequest<'a> {
        BuildRequest {
            lease,
            settings,
            kind: InvoiceKind::Regular,
            period: april(),
            invoice_date: d(2026, 4, 1),
            recurring_charges: charges,
            statements: &[],
            adjustments: &[],
            existing_invoices: &[],
            default_payment_term_days: 10,
        }
    }

    fn new_draft(outcome: BuildOutcome) -> InvoiceDraft {
        match outcome {
            BuildOutcome::New(draft) => draft,
            BuildOutcome::Existing(inv) => panic!("expected a new draft, got {}", inv.invoice_number),
        }
    }

    #[test]
    fn test_full_month_rent() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let charges = [rent(&l, dec!(12000), dec!(0))];

        let draft = new_draft(InvoiceBuilder::build(&request(&l, Some(&s), &charges)).unwrap());

        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].line_number, 1);
        assert_eq!(draft.lines[0].line_amount, dec!(12000));
        assert_eq!(draft.due_date, d(2026, 4, 8));
    }

    #[test]
    fn test_mid_month_move_in_is_prorated() {
        let l = lease(d(2026, 4, 16));
        let s = settings(&l);
        let charges = [rent(&l, dec!(12000), dec!(0))];

        let draft = new_draft(InvoiceBuilder::build(&request(&l, Some(&s), &charges)).unwrap());
        let invoice = draft.into_invoice("INV-000001".to_string(), Utc::now());

        assert_eq!(invoice.lines[0].line_amount, dec!(6000.00));
        assert_eq!(invoice.lines[0].description, "Monthly rent (15/30 days)");
        assert_eq!(invoice.total_amount, dec!(6000.00));
        assert_eq!(invoice.balance_amount, dec!(6000.00));
        assert_eq!(invoice.paid_amount, Decimal::ZERO);
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_missing_settings() {
        let l = lease(d(2026, 1, 1));
        let charges = [rent(&l, dec!(100), dec!(0))];
        let err = InvoiceBuilder::build(&request(&l, None, &charges)).unwrap_err();
        assert_eq!(err, InvoiceError::MissingBillingSettings(l.id));
        assert_eq!(err.error_code(), "MISSING_BILLING_SETTINGS");
    }

    #[test]
    fn test_inactive_lease_not_billable() {
        let mut l = lease(d(2026, 1, 1));
        l.status = LeaseStatus::Terminated;
        let s = settings(&l);
        let err = InvoiceBuilder::build(&request(&l, Some(&s), &[])).unwrap_err();
        assert!(matches!(err, InvoiceError::LeaseNotBillable { .. }));
    }

    #[test]
    fn test_nothing_to_invoice() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let err = InvoiceBuilder::build(&request(&l, Some(&s), &[])).unwrap_err();
        assert!(matches!(err, InvoiceError::NothingToInvoice { .. }));
    }

    #[test]
    fn test_existing_draft_returned_unchanged() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let charges = [rent(&l, dec!(500), dec!(0))];
        let first = new_draft(InvoiceBuilder::build(&request(&l, Some(&s), &charges)).unwrap())
            .into_invoice("INV-000001".to_string(), Utc::now());

        let existing = [first.clone()];
        let mut req = request(&l, Some(&s), &charges);
        req.existing_invoices = &existing;

        match InvoiceBuilder::build(&req).unwrap() {
            BuildOutcome::Existing(inv) => {
                assert_eq!(inv.id, first.id);
                assert_eq!(inv.invoice_number, "INV-000001");
            }
            BuildOutcome::New(_) => panic!("expected the existing draft"),
        }
    }

    #[test]
    fn test_issued_invoice_blocks_and_void_does_not() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let charges = [rent(&l, dec!(500), dec!(0))];
        let mut issued = new_draft(InvoiceBuilder::build(&request(&l, Some(&s), &charges)).unwrap())
            .into_invoice("INV-000001".to_string(), Utc::now());
        issued.issue(Utc::now()).unwrap();

        let existing = [issued.clone()];
        let mut req = request(&l, Some(&s), &charges);
        req.existing_invoices = &existing;
        let err = InvoiceBuilder::build(&req).unwrap_err();
        assert!(matches!(err, InvoiceError::DuplicateInvoice { status: InvoiceStatus::Issued, .. }));

        issued.void("Wrong amount", Utc::now()).unwrap();
        let existing = [issued];
        req.existing_invoices = &existing;
        assert!(matches!(InvoiceBuilder::build(&req).unwrap(), BuildOutcome::New(_)));
    }

    #[test]
    fn test_other_kind_does_not_block() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let charges = [rent(&l, dec!(500), dec!(0))];
        let mut regular = new_draft(InvoiceBuilder::build(&request(&l, Some(&s), &charges)).unwrap())
            .into_invoice("INV-000001".to_string(), Utc::now());
        regular.issue(Utc::now()).unwrap();

        let mut statement = UtilityStatement::new(
            l.organization_id,
            l.id,
            UtilityType::Water,
            april(),
            dec!(0),
            Utc::now(),
        );
        statement.set_direct_amount(dec!(300), Utc::now()).unwrap();
        statement.finalize_direct(Utc::now()).unwrap();

        let existing = [regular];
        let statements = [statement];
        let mut req = request(&l, Some(&s), &charges);
        req.kind = InvoiceKind::Utility;
        req.existing_invoices = &existing;
        req.statements = &statements;

        let draft = new_draft(InvoiceBuilder::build(&req).unwrap());
        assert_eq!(draft.kind, InvoiceKind::Utility);
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].charge_type, ChargeType::Utility);
        assert_eq!(draft.total(), dec!(300));
    }

    #[test]
    fn test_lines_numbered_in_collection_order_with_tax() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let mut parking = rent(&l, dec!(1000), dec!(18.00));
        parking.charge_type = ChargeType::Parking;
        parking.description = "Parking".to_string();
        let charges = [rent(&l, dec!(12000), dec!(0)), parking];

        let mut statement = UtilityStatement::new(
            l.organization_id,
            l.id,
            UtilityType::Electricity,
            april(),
            dec!(5.00),
            Utc::now(),
        );
        statement.set_direct_amount(dec!(200), Utc::now()).unwrap();
        statement.finalize_direct(Utc::now()).unwrap();
        let draft_statement = UtilityStatement::new(
            l.organization_id,
            l.id,
            UtilityType::Water,
            april(),
            dec!(0),
            Utc::now(),
        );
        let statements = [statement, draft_statement];

        let adjustments = [ManualAdjustment {
            kind: AdjustmentKind::Discount,
            description: "Loyalty".to_string(),
            amount: dec!(500),
            tax_rate: dec!(0),
        }];

        let mut req = request(&l, Some(&s), &charges);
        req.statements = &statements;
        req.adjustments = &adjustments;

        let invoice = new_draft(InvoiceBuilder::build(&req).unwrap())
            .into_invoice("INV-000002".to_string(), Utc::now());

        let numbers: Vec<u32> = invoice.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(invoice.lines[1].tax_amount, dec!(180.00));
        assert_eq!(invoice.lines[2].tax_amount, dec!(10.00));
        assert_eq!(invoice.lines[3].line_amount, dec!(-500));
        assert_eq!(invoice.subtotal, dec!(12700));
        assert_eq!(invoice.tax_amount, dec!(190.00));
        assert_eq!(invoice.total_amount, dec!(12890.00));
    }

    #[test]
    fn test_billed_statement_not_rebilled() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let mut statement = UtilityStatement::new(
            l.organization_id,
            l.id,
            UtilityType::Gas,
            april(),
            dec!(0),
            Utc::now(),
        );
        statement.set_direct_amount(dec!(80), Utc::now()).unwrap();
        statement.finalize_direct(Utc::now()).unwrap();
        let statements = [statement];

        let mut req = request(&l, Some(&s), &[]);
        req.kind = InvoiceKind::Utility;
        req.statements = &statements;
        let mut first = new_draft(InvoiceBuilder::build(&req).unwrap())
            .into_invoice("INV-000001".to_string(), Utc::now());
        first.issue(Utc::now()).unwrap();
        // A regular invoice for the same period must skip the billed statement.
        let existing = [first];
        req.kind = InvoiceKind::Regular;
        req.existing_invoices = &existing;

        let err = InvoiceBuilder::build(&req).unwrap_err();
        assert!(matches!(err, InvoiceError::NothingToInvoice { .. }));
    }

    #[test]
    fn test_negative_total_rejected() {
        let l = lease(d(2026, 1, 1));
        let s = settings(&l);
        let charges = [rent(&l, dec!(100), dec!(0))];
        let adjustments = [ManualAdjustment {
            kind: AdjustmentKind::Discount,
            description: "Too generous".to_string(),
            amount: dec!(150),
            tax_rate: dec!(0),
        }];
        let mut req = request(&l, Some(&s), &charges);
        req.adjustments = &adjustments;

        assert_eq!(
            InvoiceBuilder::build(&req).unwrap_err(),
            InvoiceError::NegativeInvoiceTotal(dec!(-50))
        );
    }

    #[test]
    fn test_default_payment_term_and_fixed_thirty_method() {
        let l = lease(d(2026, 4, 16));
        let mut s = settings(&l);
        s.payment_term_days = None;
        s.proration_method = ProrationMethod::FixedThirtyDayMonth;
        let charges = [rent(&l, dec!(3000), dec!(0))];

        let draft = new_draft(InvoiceBuilder::build(&request(&l, Some(&s), &charges)).unwrap());
        assert_eq!(draft.due_date, d(2026, 4, 11));
        assert_eq!(draft.lines[0].line_amount, dec!(1500.00));
    }

    #[test]
    fn test_quarterly_charge_billed_in_full_when_due() {
        let l = lease(d(2026, 1, 10));
        let s = settings(&l);
        let mut maintenance = rent(&l, dec!(900), dec!(0));
        maintenance.frequency = ChargeFrequency::Quarterly;
        maintenance.charge_type = ChargeType::Maintenance;
        let charges = [maintenance];

        let draft = new_draft(InvoiceBuilder::build(&request(&l, Some(&s), &charges)).unwrap());
        assert_eq!(draft.lines[0].line_amount, dec!(900));

        let mut req = request(&l, Some(&s), &charges);
        req.period = BillingPeriod::calendar_month(d(2026, 5, 1)).unwrap();
        assert!(matches!(
            InvoiceBuilder::build(&req).unwrap_err(),
            InvoiceError::NothingToInvoice { .. }
        ));
    }
}
