//! In-memory storage adapter.
//!
//! Backs the command services in tests, demos and the runner binary. All
//! tables live behind one async `RwLock`, so every repository call and every
//! `commit` is atomic. Soft-deleted rows are invisible to every read.
//!
//! Faults can be injected to exercise the retry policy and run aborts:
//!
//! - `fail_next_writes(n)` - the next `n` writes of any kind fail
//! - `fail_invoice_writes(n)` - the next `n` invoice writes fail
//! - `set_unavailable(true)` - every call fails until switched back
//!
//! Passing `u32::MAX` keeps a write fault armed until `clear_faults`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use leasebill_core::invoice::Invoice;
use leasebill_core::invoice_run::InvoiceRun;
use leasebill_core::lease::{Lease, LeaseBillingSetting, LeaseRecurringCharge};
use leasebill_core::payment::{CreditNote, Payment};
use leasebill_core::rating::{UtilityRatePlan, UtilityType};
use leasebill_core::statement::UtilityStatement;
use leasebill_core::{INITIAL_VERSION, Versioned};
use leasebill_shared::types::{
    CreditNoteId, InvoiceId, InvoiceRunId, LeaseId, OrganizationId, PaymentId, RatePlanId,
    RecurringChargeId, StatementId,
};

use crate::repositories::{
    Change, ChangeSet, CommitReceipt, CreditNoteRepository, InvoiceFilter, InvoiceRepository,
    InvoiceRunRepository, LeaseRepository, PaymentRepository, RatePlanRepository,
    SequenceGenerator, SequenceKind, StatementFilter, StatementRepository, StoreError, StoreResult,
    UnitOfWork,
};

/// Rows that may carry a soft-delete marker.
trait Row {
    fn is_active(&self) -> bool;
}

macro_rules! soft_deletable {
    ($($ty:ty),* $(,)?) => {
        $(impl Row for $ty {
            fn is_active(&self) -> bool {
                self.deleted_at.is_none()
            }
        })*
    };
}

soft_deletable!(
    Lease,
    LeaseRecurringCharge,
    UtilityRatePlan,
    UtilityStatement,
    Invoice
);

impl Row for InvoiceRun {
    fn is_active(&self) -> bool {
        true
    }
}

impl Row for Payment {
    fn is_active(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct Tables {
    leases: HashMap<LeaseId, Lease>,
    settings: HashMap<LeaseId, LeaseBillingSetting>,
    charges: HashMap<RecurringChargeId, LeaseRecurringCharge>,
    rate_plans: HashMap<RatePlanId, UtilityRatePlan>,
    statements: HashMap<StatementId, UtilityStatement>,
    invoices: HashMap<InvoiceId, Invoice>,
    runs: HashMap<InvoiceRunId, InvoiceRun>,
    payments: HashMap<PaymentId, Payment>,
    credit_notes: HashMap<CreditNoteId, CreditNote>,
}

/// Called with the running count after each `add_invoice`.
type InsertHook = Box<dyn Fn(u32) + Send + Sync>;

/// In-memory implementation of every repository contract.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    sequences: DashMap<SequenceKind, u64>,
    unavailable: AtomicBool,
    write_faults: AtomicU32,
    invoice_write_faults: AtomicU32,
    lease_read_faults: AtomicU32,
    invoices_added: AtomicU32,
    invoice_hook: Mutex<Option<InsertHook>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            sequences: DashMap::new(),
            unavailable: AtomicBool::new(false),
            write_faults: AtomicU32::new(0),
            invoice_write_faults: AtomicU32::new(0),
            lease_read_faults: AtomicU32::new(0),
            invoices_added: AtomicU32::new(0),
            invoice_hook: Mutex::new(None),
        }
    }

    /// Make every call fail with `Unavailable` (or stop doing so).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `count` writes of any kind.
    pub fn fail_next_writes(&self, count: u32) {
        self.write_faults.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` writes touching an invoice.
    pub fn fail_invoice_writes(&self, count: u32) {
        self.invoice_write_faults.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` organization lease listings.
    pub fn fail_lease_reads(&self, count: u32) {
        self.lease_read_faults.store(count, Ordering::SeqCst);
    }

    /// Disarm every injected fault.
    pub fn clear_faults(&self) {
        self.set_unavailable(false);
        self.fail_next_writes(0);
        self.fail_invoice_writes(0);
        self.fail_lease_reads(0);
    }

    /// Run `hook` after every successful `add_invoice`, with the number of
    /// invoices added so far. The table lock is released first.
    pub fn on_invoice_added(&self, hook: impl Fn(u32) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.invoice_hook.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    fn invoice_added(&self) {
        let count = self.invoices_added.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if let Ok(slot) = self.invoice_hook.lock()
            && let Some(hook) = slot.as_ref()
        {
            hook(count);
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is unavailable".to_string()));
        }
        Ok(())
    }

    fn check_write(&self, touches_invoice: bool) -> StoreResult<()> {
        self.check_available()?;
        if touches_invoice && take_fault(&self.invoice_write_faults) {
            return Err(StoreError::Unavailable(
                "injected invoice write fault".to_string(),
            ));
        }
        if take_fault(&self.write_faults) {
            return Err(StoreError::Unavailable("injected write fault".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Consume one armed fault. `u32::MAX` never runs out.
fn take_fault(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
            0 => None,
            u32::MAX => Some(n),
            _ => Some(n - 1),
        })
        .is_ok()
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn get_active<K, T>(table: &HashMap<K, T>, entity: &'static str, id: K) -> StoreResult<T>
where
    K: Eq + Hash + ToString,
    T: Row + Clone,
{
    table
        .get(&id)
        .filter(|row| row.is_active())
        .cloned()
        .ok_or_else(|| not_found(entity, id))
}

/// Active rows matching `predicate`, ordered by key (ids are time-ordered).
fn list_active<K, T>(table: &HashMap<K, T>, predicate: impl Fn(&T) -> bool) -> Vec<T>
where
    K: Ord,
    T: Row + Clone,
{
    let mut rows: Vec<(&K, &T)> = table
        .iter()
        .filter(|(_, row)| row.is_active() && predicate(row))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    rows.into_iter().map(|(_, row)| row.clone()).collect()
}

fn check_versioned<K, T>(table: &HashMap<K, T>, key: &K, entity: &T, expected: i64) -> StoreResult<()>
where
    K: Eq + Hash,
    T: Row + Versioned,
{
    let stored = table
        .get(key)
        .filter(|row| row.is_active())
        .ok_or_else(|| not_found(T::ENTITY, entity.entity_id()))?;
    if stored.version() != expected {
        return Err(StoreError::VersionConflict {
            entity: T::ENTITY,
            id: entity.entity_id(),
            expected,
            actual: stored.version(),
        });
    }
    Ok(())
}

fn write_versioned<K, T>(table: &mut HashMap<K, T>, key: K, mut entity: T, expected: i64) -> T
where
    K: Eq + Hash,
    T: Versioned + Clone,
{
    entity.set_version(expected + 1);
    table.insert(key, entity.clone());
    entity
}

fn check_invoice_insert(tables: &Tables, invoice: &Invoice) -> StoreResult<()> {
    if tables.invoices.contains_key(&invoice.id) {
        return Err(StoreError::Duplicate {
            entity: Invoice::ENTITY,
            key: invoice.id.to_string(),
        });
    }
    for stored in tables.invoices.values() {
        if stored.invoice_number == invoice.invoice_number {
            return Err(StoreError::Duplicate {
                entity: Invoice::ENTITY,
                key: invoice.invoice_number.clone(),
            });
        }
        if stored.is_active()
            && stored.status.is_live()
            && stored.lease_id == invoice.lease_id
            && stored.kind == invoice.kind
            && stored.period == invoice.period
        {
            return Err(StoreError::Duplicate {
                entity: Invoice::ENTITY,
                key: format!("{}/{}/{}", invoice.lease_id, invoice.kind, invoice.period),
            });
        }
    }
    Ok(())
}

fn check_payment_update(tables: &Tables, payment: &Payment, expected: i64) -> StoreResult<()> {
    check_versioned(&tables.payments, &payment.id, payment, expected)?;
    if let Some(stored) = tables.payments.get(&payment.id) {
        let previous = stored.history();
        let next = payment.history();
        if next.len() < previous.len() || next[..previous.len()] != *previous {
            return Err(StoreError::Integrity {
                entity: Payment::ENTITY,
                id: payment.id.to_string(),
                reason: "status history is append-only".to_string(),
            });
        }
    }
    Ok(())
}

fn check_change(tables: &Tables, change: &Change) -> StoreResult<()> {
    match change {
        Change::InsertInvoice(invoice) => check_invoice_insert(tables, invoice),
        Change::UpdateInvoice {
            invoice,
            expected_version,
        } => check_versioned(&tables.invoices, &invoice.id, invoice, *expected_version),
        Change::InsertPayment(payment) => {
            if tables.payments.contains_key(&payment.id) {
                return Err(StoreError::Duplicate {
                    entity: Payment::ENTITY,
                    key: payment.id.to_string(),
                });
            }
            Ok(())
        }
        Change::UpdatePayment {
            payment,
            expected_version,
        } => check_payment_update(tables, payment, *expected_version),
        Change::InsertCreditNote(note) => {
            let taken = tables
                .credit_notes
                .values()
                .any(|n| n.id == note.id || n.credit_note_number == note.credit_note_number);
            if taken {
                return Err(StoreError::Duplicate {
                    entity: "credit_note",
                    key: note.credit_note_number.clone(),
                });
            }
            Ok(())
        }
    }
}

#[async_trait]
impl LeaseRepository for InMemoryStore {
    async fn get_lease(&self, id: LeaseId) -> StoreResult<Lease> {
        self.check_available()?;
        get_active(&self.tables.read().await.leases, "lease", id)
    }

    async fn list_leases_by_org(&self, organization_id: OrganizationId) -> StoreResult<Vec<Lease>> {
        self.check_available()?;
        if take_fault(&self.lease_read_faults) {
            return Err(StoreError::Unavailable("injected lease read fault".to_string()));
        }
        let tables = self.tables.read().await;
        Ok(list_active(&tables.leases, |l| {
            l.organization_id == organization_id
        }))
    }

    async fn lease_exists(&self, id: LeaseId) -> StoreResult<bool> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.leases.get(&id).is_some_and(Row::is_active))
    }

    async fn get_billing_setting(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<Option<LeaseBillingSetting>> {
        self.check_available()?;
        Ok(self.tables.read().await.settings.get(&lease_id).cloned())
    }

    async fn list_recurring_charges(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<Vec<LeaseRecurringCharge>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.charges, |c| c.lease_id == lease_id))
    }

    async fn add_lease(&self, lease: Lease) -> StoreResult<Lease> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        if tables.leases.contains_key(&lease.id) {
            return Err(StoreError::Duplicate {
                entity: "lease",
                key: lease.id.to_string(),
            });
        }
        tables.leases.insert(lease.id, lease.clone());
        Ok(lease)
    }

    async fn add_billing_setting(
        &self,
        setting: LeaseBillingSetting,
    ) -> StoreResult<LeaseBillingSetting> {
        self.check_write(false)?;
        setting
            .validate()
            .map_err(|e| StoreError::Invalid(e.into()))?;
        let mut tables = self.tables.write().await;
        if tables.settings.contains_key(&setting.lease_id) {
            return Err(StoreError::Duplicate {
                entity: "lease_billing_setting",
                key: setting.lease_id.to_string(),
            });
        }
        tables.settings.insert(setting.lease_id, setting.clone());
        Ok(setting)
    }

    async fn add_recurring_charge(
        &self,
        charge: LeaseRecurringCharge,
    ) -> StoreResult<LeaseRecurringCharge> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        tables.charges.insert(charge.id, charge.clone());
        Ok(charge)
    }

    async fn delete_lease(&self, id: LeaseId, at: DateTime<Utc>) -> StoreResult<()> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        let lease = tables
            .leases
            .get_mut(&id)
            .filter(|l| l.is_active())
            .ok_or_else(|| not_found("lease", id))?;
        lease.deleted_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl RatePlanRepository for InMemoryStore {
    async fn list_rate_plans(
        &self,
        organization_id: OrganizationId,
        utility_type: UtilityType,
    ) -> StoreResult<Vec<UtilityRatePlan>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.rate_plans, |p| {
            p.organization_id == organization_id && p.utility_type == utility_type
        }))
    }

    async fn add_rate_plan(&self, plan: UtilityRatePlan) -> StoreResult<UtilityRatePlan> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        tables.rate_plans.insert(plan.id, plan.clone());
        Ok(plan)
    }
}

#[async_trait]
impl StatementRepository for InMemoryStore {
    async fn get_statement(&self, id: StatementId) -> StoreResult<UtilityStatement> {
        self.check_available()?;
        get_active(
            &self.tables.read().await.statements,
            UtilityStatement::ENTITY,
            id,
        )
    }

    async fn list_statements_by_lease(
        &self,
        lease_id: LeaseId,
    ) -> StoreResult<Vec<UtilityStatement>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.statements, |s| s.lease_id == lease_id))
    }

    async fn list_statements_by_org(
        &self,
        organization_id: OrganizationId,
        filter: StatementFilter,
    ) -> StoreResult<Vec<UtilityStatement>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.statements, |s| {
            s.organization_id == organization_id && filter.matches(s)
        }))
    }

    async fn add_statement(&self, mut statement: UtilityStatement) -> StoreResult<UtilityStatement> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        if tables.statements.contains_key(&statement.id) {
            return Err(StoreError::Duplicate {
                entity: UtilityStatement::ENTITY,
                key: statement.id.to_string(),
            });
        }
        statement.set_version(INITIAL_VERSION);
        tables.statements.insert(statement.id, statement.clone());
        Ok(statement)
    }

    async fn update_statement(
        &self,
        statement: UtilityStatement,
        expected_version: i64,
    ) -> StoreResult<UtilityStatement> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        check_versioned(&tables.statements, &statement.id, &statement, expected_version)?;
        Ok(write_versioned(
            &mut tables.statements,
            statement.id,
            statement,
            expected_version,
        ))
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Invoice> {
        self.check_available()?;
        get_active(&self.tables.read().await.invoices, Invoice::ENTITY, id)
    }

    async fn list_invoices_by_lease(&self, lease_id: LeaseId) -> StoreResult<Vec<Invoice>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.invoices, |i| i.lease_id == lease_id))
    }

    async fn list_invoices_by_org(
        &self,
        organization_id: OrganizationId,
        filter: InvoiceFilter,
    ) -> StoreResult<Vec<Invoice>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.invoices, |i| {
            i.organization_id == organization_id && filter.matches(i)
        }))
    }

    async fn add_invoice(&self, mut invoice: Invoice) -> StoreResult<Invoice> {
        self.check_write(true)?;
        let mut tables = self.tables.write().await;
        check_invoice_insert(&tables, &invoice)?;
        invoice.set_version(INITIAL_VERSION);
        tables.invoices.insert(invoice.id, invoice.clone());
        drop(tables);
        self.invoice_added();
        Ok(invoice)
    }

    async fn update_invoice(&self, invoice: Invoice, expected_version: i64) -> StoreResult<Invoice> {
        self.check_write(true)?;
        let mut tables = self.tables.write().await;
        check_versioned(&tables.invoices, &invoice.id, &invoice, expected_version)?;
        Ok(write_versioned(
            &mut tables.invoices,
            invoice.id,
            invoice,
            expected_version,
        ))
    }

    async fn statement_is_billed(&self, statement_id: StatementId) -> StoreResult<bool> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .values()
            .any(|i| i.is_active() && i.status.is_live() && i.bills_statement(statement_id)))
    }
}

#[async_trait]
impl InvoiceRunRepository for InMemoryStore {
    async fn get_run(&self, id: InvoiceRunId) -> StoreResult<InvoiceRun> {
        self.check_available()?;
        get_active(&self.tables.read().await.runs, InvoiceRun::ENTITY, id)
    }

    async fn list_runs_by_org(
        &self,
        organization_id: OrganizationId,
    ) -> StoreResult<Vec<InvoiceRun>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.runs, |r| {
            r.organization_id == organization_id
        }))
    }

    async fn add_run(&self, mut run: InvoiceRun) -> StoreResult<InvoiceRun> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        run.set_version(INITIAL_VERSION);
        tables.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_run(&self, run: InvoiceRun, expected_version: i64) -> StoreResult<InvoiceRun> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        check_versioned(&tables.runs, &run.id, &run, expected_version)?;
        Ok(write_versioned(&mut tables.runs, run.id, run, expected_version))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn get_payment(&self, id: PaymentId) -> StoreResult<Payment> {
        self.check_available()?;
        get_active(&self.tables.read().await.payments, Payment::ENTITY, id)
    }

    async fn list_payments_by_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(list_active(&tables.payments, |p| p.invoice_id == invoice_id))
    }

    async fn add_payment(&self, mut payment: Payment) -> StoreResult<Payment> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        check_change(&tables, &Change::InsertPayment(payment.clone()))?;
        payment.set_version(INITIAL_VERSION);
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn update_payment(&self, payment: Payment, expected_version: i64) -> StoreResult<Payment> {
        self.check_write(false)?;
        let mut tables = self.tables.write().await;
        check_payment_update(&tables, &payment, expected_version)?;
        Ok(write_versioned(
            &mut tables.payments,
            payment.id,
            payment,
            expected_version,
        ))
    }
}

#[async_trait]
impl CreditNoteRepository for InMemoryStore {
    async fn get_credit_note(&self, id: CreditNoteId) -> StoreResult<CreditNote> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables
            .credit_notes
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("credit_note", id))
    }

    async fn list_credit_notes_by_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> StoreResult<Vec<CreditNote>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut notes: Vec<CreditNote> = tables
            .credit_notes
            .values()
            .filter(|n| n.invoice_id == invoice_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(notes)
    }
}

#[async_trait]
impl SequenceGenerator for InMemoryStore {
    async fn next_value(&self, kind: SequenceKind) -> StoreResult<u64> {
        self.check_available()?;
        let mut value = self.sequences.entry(kind).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn commit(&self, changes: ChangeSet) -> StoreResult<CommitReceipt> {
        let touches_invoice = changes.changes().iter().any(|c| {
            matches!(
                c,
                Change::InsertInvoice(_) | Change::UpdateInvoice { .. }
            )
        });
        self.check_write(touches_invoice)?;

        let mut tables = self.tables.write().await;
        for change in changes.changes() {
            check_change(&tables, change)?;
        }

        let mut receipt = CommitReceipt::default();
        for change in changes.into_changes() {
            match change {
                Change::InsertInvoice(mut invoice) => {
                    invoice.set_version(INITIAL_VERSION);
                    tables.invoices.insert(invoice.id, invoice.clone());
                    receipt.invoices.push(invoice);
                }
                Change::UpdateInvoice {
                    invoice,
                    expected_version,
                } => {
                    let key = invoice.id;
                    receipt.invoices.push(write_versioned(
                        &mut tables.invoices,
                        key,
                        invoice,
                        expected_version,
                    ));
                }
                Change::InsertPayment(mut payment) => {
                    payment.set_version(INITIAL_VERSION);
                    tables.payments.insert(payment.id, payment.clone());
                    receipt.payments.push(payment);
                }
                Change::UpdatePayment {
                    payment,
                    expected_version,
                } => {
                    let key = payment.id;
                    receipt.payments.push(write_versioned(
                        &mut tables.payments,
                        key,
                        payment,
                        expected_version,
                    ));
                }
                Change::InsertCreditNote(note) => {
                    tables.credit_notes.insert(note.id, note.clone());
                    receipt.credit_notes.push(note);
                }
            }
        }
        Ok(receipt)
    }
}
