//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{CheckoutConfig, DEFAULT_MIN_ADDRESS_LEN};
use payment::{MerchantConfig, PaymentConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string (unset: in-memory store)
/// - `ADMIN_TOKEN`: token for operator endpoints (unset: disabled)
/// - `MERCHANT_UPI_ID`, `MERCHANT_NAME`, `OPERATOR_WHATSAPP`: payment hand-off
/// - `SETTLING_SECONDS`: payment settling cooldown (default: `3`)
/// - `MIN_ADDRESS_LEN`: minimum shipping address length (default: `10`)
/// - `STALE_ORDER_HOURS`: age at which unpaid orders are abandoned (default: `48`)
/// - `SWEEP_INTERVAL_SECONDS`: stale order sweep period (default: `300`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub admin_token: Option<String>,
    pub merchant: MerchantConfig,
    pub settling_seconds: u64,
    pub min_address_len: usize,
    pub stale_order_hours: u64,
    pub sweep_interval_seconds: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup. Unparseable numbers
    /// and blank values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| text(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: text("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: text("DATABASE_URL"),
            admin_token: text("ADMIN_TOKEN"),
            merchant: MerchantConfig {
                upi_id: text("MERCHANT_UPI_ID").unwrap_or(defaults.merchant.upi_id),
                payee_name: text("MERCHANT_NAME").unwrap_or(defaults.merchant.payee_name),
                operator_whatsapp: text("OPERATOR_WHATSAPP")
                    .unwrap_or(defaults.merchant.operator_whatsapp),
            },
            settling_seconds: number("SETTLING_SECONDS").unwrap_or(defaults.settling_seconds),
            min_address_len: number("MIN_ADDRESS_LEN")
                .map(|n| n as usize)
                .unwrap_or(defaults.min_address_len),
            stale_order_hours: number("STALE_ORDER_HOURS").unwrap_or(defaults.stale_order_hours),
            sweep_interval_seconds: number("SWEEP_INTERVAL_SECONDS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.sweep_interval_seconds),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            min_address_len: self.min_address_len,
        }
    }

    pub fn payment_config(&self) -> PaymentConfig {
        PaymentConfig {
            settling: Duration::from_secs(self.settling_seconds),
            merchant: self.merchant.clone(),
        }
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_order_hours * 60 * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            admin_token: None,
            merchant: MerchantConfig::default(),
            settling_seconds: 3,
            min_address_len: DEFAULT_MIN_ADDRESS_LEN,
            stale_order_hours: 48,
            sweep_interval_seconds: 300,
        }
    }
}
