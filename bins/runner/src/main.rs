//! Leasebill demo runner
//!
//! Seeds a small portfolio into the in-memory store and drives one billing
//! cycle through it: a utility statement, a monthly invoice run, a payment
//! and overdue marking.
//!
//! Usage: `cargo run --bin leasebill [YYYY-MM-DD]` (first day of the run window,
//! defaults to the first of the current month).

use std::sync::Arc;

use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use leasebill_core::invoice::InvoiceStatus;
use leasebill_core::invoice_run::InvoiceRunKind;
use leasebill_core::lease::{
    ChargeFrequency, ChargeType, Lease, LeaseBillingSetting, LeaseRecurringCharge, LeaseStatus,
};
use leasebill_core::payment::{PaymentMode, PaymentStatus, PaymentType};
use leasebill_core::proration::ProrationMethod;
use leasebill_core::rating::{UtilityRatePlan, UtilityRateSlab, UtilityType};
use leasebill_db::repositories::{LeaseRepository, RatePlanRepository};
use leasebill_db::{
    CreateInvoiceRunCommand, CreateStatementCommand, InMemoryStore, InvoiceRunService,
    InvoiceService, PaymentLedgerService, RecordPaymentCommand, StatementService,
};
use leasebill_shared::AppConfig;
use leasebill_shared::types::{LeaseId, OrganizationId, RatePlanId, RecurringChargeId, UserId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();

    let window_start = match std::env::args().nth(1) {
        Some(arg) => NaiveDate::parse_from_str(&arg, "%Y-%m-%d")
            .with_context(|| format!("Invalid window start {arg:?}, expected YYYY-MM-DD"))?,
        None => Utc::now()
            .date_naive()
            .with_day(1)
            .context("Current date has no first day")?,
    };
    let previous_month = window_start
        .checked_sub_months(Months::new(1))
        .context("Window start out of range")?;

    let store = Arc::new(InMemoryStore::new());
    let organization_id = OrganizationId::new();
    let leases = seed_portfolio(&store, organization_id, previous_month).await?;
    info!(
        organization_id = %organization_id,
        leases = leases.len(),
        "Demo portfolio seeded"
    );

    // Last month's electricity for the first lease lands on this cycle's invoice.
    let statements = StatementService::new(Arc::clone(&store), &config);
    let statement = statements
        .create_statement(CreateStatementCommand {
            lease_id: leases[0],
            utility_type: UtilityType::Electricity,
            period_start: previous_month,
            period_end: window_start.pred_opt().context("Window start out of range")?,
            tax_rate: Decimal::ZERO,
        })
        .await?;
    let statement = statements
        .record_readings(statement.id, statement.version, dec!(4210), dec!(4360))
        .await?;
    statements
        .finalize_statement(statement.id, statement.version)
        .await?;

    let runs = InvoiceRunService::new(Arc::clone(&store), &config);
    let run = runs
        .create_invoice_run(CreateInvoiceRunCommand {
            organization_id,
            kind: InvoiceRunKind::Monthly,
            period_start: window_start,
            period_end: None,
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&run)?);

    let invoices = InvoiceService::new(Arc::clone(&store), &config);
    let ledger = PaymentLedgerService::new(Arc::clone(&store), &config);
    let clerk = UserId::new();

    for invoice_id in run.items.iter().filter_map(|item| item.invoice_id) {
        let draft = invoices.get_invoice(invoice_id).await?;
        if draft.status != InvoiceStatus::Draft {
            continue;
        }
        let issued = invoices.issue_invoice(draft.id, draft.version).await?;

        let half = (issued.balance_amount / Decimal::TWO).round_dp(2);
        let recorded = ledger
            .record_payment(RecordPaymentCommand {
                invoice_id: issued.id,
                amount: half,
                mode: PaymentMode::Upi,
                payment_type: PaymentType::Rent,
                status: PaymentStatus::Completed,
                payment_date: issued.invoice_date,
                reference_number: None,
                gateway: None,
                notes: Some("Demo part payment".to_string()),
                recorded_by: clerk,
            })
            .await?;
        println!(
            "{} {} total={} paid={} balance={}",
            recorded.invoice.invoice_number,
            recorded.invoice.status,
            recorded.invoice.total_amount,
            recorded.invoice.paid_amount,
            recorded.invoice.balance_amount
        );
    }

    let as_of = window_start
        .checked_add_months(Months::new(1))
        .context("Window start out of range")?;
    let overdue = invoices.mark_overdue(organization_id, as_of).await?;
    println!(
        "{} invoice(s) overdue as of {as_of}, {} failed",
        overdue.marked.len(),
        overdue.failed.len()
    );

    Ok(())
}

/// Seeds four leases and an electricity plan. The last lease has no billing
/// settings so the run shows a failed item.
async fn seed_portfolio(
    store: &InMemoryStore,
    organization_id: OrganizationId,
    since: NaiveDate,
) -> anyhow::Result<Vec<LeaseId>> {
    store
        .add_rate_plan(UtilityRatePlan {
            id: RatePlanId::new(),
            organization_id,
            utility_type: UtilityType::Electricity,
            name: "Residential tariff".to_string(),
            effective_from: since,
            effective_to: None,
            is_active: true,
            fixed_charge_on_zero_usage: false,
            tax_rate: Decimal::ZERO,
            slabs: vec![
                slab(1, dec!(0), Some(dec!(100)), dec!(5.00)),
                slab(2, dec!(100), None, dec!(7.50)),
            ],
            deleted_at: None,
        })
        .await?;

    let tenants = [
        ("A-101", "Tenant 1", dec!(12000), Some(1)),
        ("A-102", "Tenant 2", dec!(15500), Some(5)),
        ("B-201", "Tenant 3", dec!(9800), Some(1)),
        ("B-202", "Tenant 4", dec!(11000), None),
    ];

    let mut leases = Vec::with_capacity(tenants.len());
    for (unit, tenant, rent, billing_day) in tenants {
        let lease = store
            .add_lease(Lease {
                id: LeaseId::new(),
                organization_id,
                unit_ref: unit.to_string(),
                tenant_ref: tenant.to_string(),
                start_date: since,
                end_date: None,
                status: LeaseStatus::Active,
                deleted_at: None,
            })
            .await?;

        if let Some(billing_day) = billing_day {
            store
                .add_billing_setting(LeaseBillingSetting {
                    lease_id: lease.id,
                    billing_day,
                    payment_term_days: Some(10),
                    proration_method: ProrationMethod::ActualDaysInMonth,
                    auto_generate: true,
                })
                .await?;
        }

        store
            .add_recurring_charge(LeaseRecurringCharge {
                id: RecurringChargeId::new(),
                lease_id: lease.id,
                charge_type: ChargeType::Rent,
                description: "Monthly rent".to_string(),
                amount: rent,
                frequency: ChargeFrequency::Monthly,
                start_date: since,
                end_date: None,
                tax_rate: Decimal::ZERO,
                is_active: true,
                deleted_at: None,
            })
            .await?;

        leases.push(lease.id);
    }

    Ok(leases)
}

fn slab(order: u32, from: Decimal, to: Option<Decimal>, rate: Decimal) -> UtilityRateSlab {
    UtilityRateSlab {
        slab_order: order,
        from_units: from,
        to_units: to,
        rate_per_unit: rate,
        fixed_charge: None,
    }
}
