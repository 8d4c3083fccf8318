//! Payment domain types.
//!
//! A payment's status history is append-only: the field is private and the
//! only writers are `Payment::new` and `Payment::change_status`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use leasebill_shared::types::{
    AttachmentId, InvoiceId, LeaseId, OrganizationId, PaymentId, UserId, round_money,
};

use super::error::PaymentError;
use crate::concurrency::{INITIAL_VERSION, Versioned};

/// Payment status.
///
/// The valid transitions are:
/// - Pending → Completed | Failed | Cancelled
/// - Failed → Pending (retry)
/// - Completed → Refunded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting confirmation.
    Pending,
    /// Money received; counted against the invoice.
    Completed,
    /// Collection failed.
    Failed,
    /// Abandoned before completion.
    Cancelled,
    /// Money returned to the tenant.
    Refunded,
}

impl PaymentStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Completed | Self::Failed | Self::Cancelled)
                | (Self::Failed, Self::Pending)
                | (Self::Completed, Self::Refunded)
        )
    }

    /// Returns true if the payment counts toward the invoice's paid amount.
    #[must_use]
    pub fn counts_toward_invoice(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the money was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Cash.
    Cash,
    /// Cheque.
    Cheque,
    /// Bank transfer.
    BankTransfer,
    /// Debit or credit card.
    Card,
    /// UPI.
    Upi,
    /// Online gateway.
    Online,
    /// Anything else.
    Other,
}

/// What the payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Rent.
    Rent,
    /// Security deposit.
    Deposit,
    /// Maintenance.
    Maintenance,
    /// Utilities.
    Utility,
    /// Anything else.
    Other,
}

/// Gateway or biller details, stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMetadata {
    /// Gateway provider name.
    pub provider: Option<String>,
    /// Gateway transaction id.
    pub transaction_id: Option<String>,
    /// Biller id.
    pub biller_id: Option<String>,
    /// Raw gateway response code.
    pub response_code: Option<String>,
}

/// One immutable status-change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusHistory {
    /// Previous status; `None` for the row written on insert.
    pub from_status: Option<PaymentStatus>,
    /// New status.
    pub to_status: PaymentStatus,
    /// When the change happened.
    pub changed_at: DateTime<Utc>,
    /// Who made the change.
    pub changed_by: UserId,
    /// Optional reason.
    pub reason: Option<String>,
}

/// Metadata for a file stored elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttachment {
    /// Unique identifier.
    pub id: AttachmentId,
    /// Original file name.
    pub file_name: String,
    /// MIME type.
    pub content_type: String,
    /// Key in the external file store.
    pub storage_key: String,
    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,
    /// Uploader.
    pub uploaded_by: UserId,
}

/// Input for `Payment::new`.
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Invoice paid.
    pub invoice_id: InvoiceId,
    /// Lease paying.
    pub lease_id: LeaseId,
    /// Amount (positive).
    pub amount: Decimal,
    /// Payment mode.
    pub mode: PaymentMode,
    /// Payment type.
    pub payment_type: PaymentType,
    /// Initial status, usually Pending or Completed.
    pub status: PaymentStatus,
    /// Value date.
    pub payment_date: NaiveDate,
    /// Cheque number, bank reference and so on.
    pub reference_number: Option<String>,
    /// Gateway details.
    pub gateway: Option<GatewayMetadata>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Payment aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier.
    pub id: PaymentId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Invoice paid.
    pub invoice_id: InvoiceId,
    /// Lease paying.
    pub lease_id: LeaseId,
    /// Amount.
    pub amount: Decimal,
    /// Payment mode.
    pub mode: PaymentMode,
    /// Payment type.
    pub payment_type: PaymentType,
    /// Current status.
    pub status: PaymentStatus,
    /// Value date.
    pub payment_date: NaiveDate,
    /// External reference.
    pub reference_number: Option<String>,
    /// Gateway details.
    pub gateway: Option<GatewayMetadata>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Attached files.
    pub attachments: Vec<PaymentAttachment>,
    history: Vec<PaymentStatusHistory>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Version token.
    pub version: i64,
}

impl Payment {
    /// Creates a payment and writes its initial history row.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` unless `amount > 0`, `InvalidTransition` for an
    /// initial status other than Pending or Completed.
    pub fn new(
        input: NewPayment,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, PaymentError> {
        if input.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(input.amount));
        }
        if !matches!(input.status, PaymentStatus::Pending | PaymentStatus::Completed) {
            return Err(PaymentError::InvalidTransition {
                from: PaymentStatus::Pending,
                to: input.status,
            });
        }

        Ok(Self {
            id: PaymentId::new(),
            organization_id: input.organization_id,
            invoice_id: input.invoice_id,
            lease_id: input.lease_id,
            amount: round_money(input.amount),
            mode: input.mode,
            payment_type: input.payment_type,
            status: input.status,
            payment_date: input.payment_date,
            reference_number: input.reference_number,
            gateway: input.gateway,
            notes: input.notes,
            attachments: Vec::new(),
            history: vec![PaymentStatusHistory {
                from_status: None,
                to_status: input.status,
                changed_at: now,
                changed_by: actor,
                reason: None,
            }],
            created_at: now,
            updated_at: now,
            version: INITIAL_VERSION,
        })
    }

    /// Status changes in the order they happened.
    #[must_use]
    pub fn history(&self) -> &[PaymentStatusHistory] {
        &self.history
    }

    /// Moves to `to` and appends a history row.
    ///
    /// Returns the previous status.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` outside the state machine, `ReasonRequired` for a
    /// refund or cancellation without a reason.
    pub fn change_status(
        &mut self,
        to: PaymentStatus,
        actor: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PaymentStatus, PaymentError> {
        let from = self.status;
        if !from.can_transition_to(to) {
            return Err(PaymentError::InvalidTransition { from, to });
        }
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if matches!(to, PaymentStatus::Refunded | PaymentStatus::Cancelled) && reason.is_none() {
            return Err(PaymentError::ReasonRequired);
        }

        self.status = to;
        self.updated_at = now;
        self.history.push(PaymentStatusHistory {
            from_status: Some(from),
            to_status: to,
            changed_at: now,
            changed_by: actor,
            reason,
        });
        Ok(from)
    }

    /// Attaches file metadata.
    ///
    /// # Errors
    ///
    /// `InvalidAttachment` for a blank file name, content type or storage key.
    pub fn add_attachment(
        &mut self,
        file_name: &str,
        content_type: &str,
        storage_key: &str,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<&PaymentAttachment, PaymentError> {
        for (field, value) in [
            ("file name", file_name),
            ("content type", content_type),
            ("storage key", storage_key),
        ] {
            if value.trim().is_empty() {
                return Err(PaymentError::InvalidAttachment(format!("{field} is required")));
            }
        }

        self.updated_at = now;
        self.attachments.push(PaymentAttachment {
            id: AttachmentId::new(),
            file_name: file_name.trim().to_string(),
            content_type: content_type.trim().to_string(),
            storage_key: storage_key.trim().to_string(),
            uploaded_at: now,
            uploaded_by: actor,
        });
        Ok(&self.attachments[self.attachments.len() - 1])
    }
}

impl Versioned for Payment {
    const ENTITY: &'static str = "payment";

    fn entity_id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
