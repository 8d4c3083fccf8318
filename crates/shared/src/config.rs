//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Billing rules.
    pub billing: BillingConfig,
    /// Retry policy for storage writes.
    pub retry: RetryConfig,
    /// Invoice run behaviour.
    pub run: RunConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Billing rules shared by invoice generation and the payment ledger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// How far a completed payment may push the balance below zero before
    /// it is rejected as an overpayment.
    pub overpayment_tolerance: Decimal,
    /// Payment term applied when a lease's billing setting leaves it unset.
    pub default_payment_term_days: u32,
    /// Prefix for invoice numbers (`INV-000001`).
    pub invoice_number_prefix: String,
    /// Prefix for credit note numbers (`CN-000001`).
    pub credit_note_number_prefix: String,
    /// Zero-padded width of the numeric part of document numbers.
    pub number_width: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            overpayment_tolerance: Decimal::ZERO,
            default_payment_term_days: 7,
            invoice_number_prefix: "INV".to_string(),
            credit_note_number_prefix: "CN".to_string(),
            number_width: 6,
        }
    }
}

impl BillingConfig {
    /// Formats an invoice number, e.g. `INV-000001`.
    #[must_use]
    pub fn invoice_number(&self, sequence: u64) -> String {
        format_document_number(&self.invoice_number_prefix, sequence, self.number_width)
    }

    /// Formats a credit note number, e.g. `CN-000001`.
    #[must_use]
    pub fn credit_note_number(&self, sequence: u64) -> String {
        format_document_number(&self.credit_note_number_prefix, sequence, self.number_width)
    }
}

fn format_document_number(prefix: &str, sequence: u64, width: usize) -> String {
    format!("{prefix}-{sequence:0width$}")
}

/// Retry policy for transient storage faults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubling backoff.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
        }
    }
}

/// Invoice run behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Leases processed concurrently within one run. `1` keeps the run
    /// strictly sequential.
    pub max_concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "leasebill=info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `LEASEBILL__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LEASEBILL").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
