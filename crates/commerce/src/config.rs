//! Commerce configuration loaded from environment variables.

use common::Currency;

/// Tunables for the commerce use cases.
///
/// Reads from environment variables:
/// - `ORDER_NUMBER_PREFIX`: prefix for allocated order numbers (default: `"ORD"`)
/// - `ORDER_NUMBER_MAX_ATTEMPTS`: random candidates tried before the timestamp fallback (default: `10`)
/// - `GUEST_CART_TTL_DAYS`: inactivity after which guest carts expire (default: `30`)
/// - `CART_SWEEP_INTERVAL_HOURS`: period of the expiry sweep (default: `24`)
/// - `CONFLICT_RETRIES`: re-runs of a unit of work after a concurrency conflict (default: `1`)
/// - `DEFAULT_CURRENCY`: currency of an omitted delivery fee (default: `"USD"`)
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    pub order_number_prefix: String,
    pub order_number_max_attempts: u32,
    pub guest_cart_ttl_days: i64,
    pub cart_sweep_interval_hours: u64,
    pub conflict_retries: u32,
    pub default_currency: Currency,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl CommerceConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            order_number_prefix: std::env::var("ORDER_NUMBER_PREFIX")
                .ok()
                .filter(|prefix| !prefix.trim().is_empty())
                .unwrap_or(defaults.order_number_prefix),
            order_number_max_attempts: env_or(
                "ORDER_NUMBER_MAX_ATTEMPTS",
                defaults.order_number_max_attempts,
            ),
            guest_cart_ttl_days: env_or("GUEST_CART_TTL_DAYS", defaults.guest_cart_ttl_days),
            cart_sweep_interval_hours: env_or(
                "CART_SWEEP_INTERVAL_HOURS",
                defaults.cart_sweep_interval_hours,
            ),
            conflict_retries: env_or("CONFLICT_RETRIES", defaults.conflict_retries),
            default_currency: std::env::var("DEFAULT_CURRENCY")
                .ok()
                .and_then(|code| Currency::new(&code).ok())
                .unwrap_or(defaults.default_currency),
        }
    }

    pub fn guest_cart_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.guest_cart_ttl_days)
    }

    pub fn cart_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cart_sweep_interval_hours * 60 * 60)
    }
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: "ORD".to_string(),
            order_number_max_attempts: 10,
            guest_cart_ttl_days: 30,
            cart_sweep_interval_hours: 24,
            conflict_retries: 1,
            default_currency: Currency::usd(),
        }
    }
}
