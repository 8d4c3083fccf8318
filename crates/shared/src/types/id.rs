//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `LeaseId` where an `InvoiceId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user acting on billing records.");
typed_id!(OrganizationId, "Unique identifier for an organization.");
typed_id!(LeaseId, "Unique identifier for a lease.");
typed_id!(RecurringChargeId, "Unique identifier for a lease recurring charge.");
typed_id!(RatePlanId, "Unique identifier for a utility rate plan.");
typed_id!(StatementId, "Unique identifier for a utility statement.");
typed_id!(InvoiceId, "Unique identifier for an invoice.");
typed_id!(InvoiceLineId, "Unique identifier for an invoice line.");
typed_id!(InvoiceRunId, "Unique identifier for an invoice run.");
typed_id!(CreditNoteId, "Unique identifier for a credit note.");
typed_id!(PaymentId, "Unique identifier for a payment.");
typed_id!(AttachmentId, "Unique identifier for a payment attachment.");
