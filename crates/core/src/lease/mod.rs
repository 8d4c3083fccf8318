//! Lease inputs to billing.
//!
//! Leases, their billing settings and recurring charge templates are owned by
//! the wider property-management system. Billing only reads them.

pub mod types;

pub use types::{
    ChargeFrequency, ChargeType, Lease, LeaseBillingSetting, LeaseRecurringCharge, LeaseStatus,
};
