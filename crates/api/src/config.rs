//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{Money, OrderNumberGenerator, PricingPolicy, TaxRate};
use saga::SagaConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — Postgres connection string; unset runs on the in-memory store
/// - `FREE_SHIPPING_THRESHOLD_CENTS` — default `50000`
/// - `FLAT_SHIPPING_FEE_CENTS` — default `2500`
/// - `TAX_RATE_BPS` — default `500` (5%)
/// - `ORDER_NUMBER_PREFIX` — default `"VEN"`
/// - `CHECKOUT_TIMEOUT_SECS` — default `30`
/// - `COMPENSATION_GRACE_SECS` — default `5`
/// - `ORDER_NUMBER_ATTEMPTS` — default `3`
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub order_number_prefix: String,
    pub saga: SagaConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let pricing = PricingPolicy {
            free_shipping_threshold: parsed("FREE_SHIPPING_THRESHOLD_CENTS")
                .and_then(|c| i64::try_from(c).ok())
                .map(Money::from_cents)
                .unwrap_or(defaults.saga.pricing.free_shipping_threshold),
            flat_shipping_fee: parsed("FLAT_SHIPPING_FEE_CENTS")
                .and_then(|c| i64::try_from(c).ok())
                .map(Money::from_cents)
                .unwrap_or(defaults.saga.pricing.flat_shipping_fee),
            tax_rate: parsed("TAX_RATE_BPS")
                .and_then(|bps| u32::try_from(bps).ok())
                .map(TaxRate::from_basis_points)
                .unwrap_or(defaults.saga.pricing.tax_rate),
        };

        let saga = SagaConfig::default()
            .with_pricing(pricing)
            .with_checkout_timeout(
                parsed("CHECKOUT_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.saga.checkout_timeout),
            )
            .with_compensation_grace(
                parsed("COMPENSATION_GRACE_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.saga.compensation_grace),
            )
            .with_order_number_attempts(
                parsed("ORDER_NUMBER_ATTEMPTS")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(defaults.saga.order_number_attempts),
            );

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            order_number_prefix: lookup("ORDER_NUMBER_PREFIX")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.order_number_prefix),
            saga,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            order_number_prefix: OrderNumberGenerator::DEFAULT_PREFIX.to_string(),
            saga: SagaConfig::default(),
        }
    }
}
