use std::time::Duration;

/// Payment service settings.
///
/// Reads from environment variables:
/// - `PAYMENT_PROCESS_TIMEOUT_MS` - upper bound for one processor call (default: `5000`)
/// - `ORDER_TOTAL_TTL_SECS` - lifetime of cached order totals (default: `1800`)
/// - `ORDER_TOTAL_WAIT_MS` - how long a charge waits for a total not yet cached (default: `2000`)
/// - `PAYMENT_CARD_NUMBER` - card charged for saga payments (default: test Visa)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    pub process_timeout: Duration,
    pub order_total_ttl: Duration,
    pub order_total_wait: Duration,
    pub card_number: String,
}

impl PaymentConfig {
    pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_ORDER_TOTAL_TTL: Duration = Duration::from_secs(30 * 60);
    pub const DEFAULT_ORDER_TOTAL_WAIT: Duration = Duration::from_secs(2);
    pub const DEFAULT_CARD_NUMBER: &'static str = "4111111111111111";

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            process_timeout: env_u64("PAYMENT_PROCESS_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.process_timeout),
            order_total_ttl: env_u64("ORDER_TOTAL_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.order_total_ttl),
            order_total_wait: env_u64("ORDER_TOTAL_WAIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.order_total_wait),
            card_number: std::env::var("PAYMENT_CARD_NUMBER")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.card_number),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            process_timeout: Self::DEFAULT_PROCESS_TIMEOUT,
            order_total_ttl: Self::DEFAULT_ORDER_TOTAL_TTL,
            order_total_wait: Self::DEFAULT_ORDER_TOTAL_WAIT,
            card_number: Self::DEFAULT_CARD_NUMBER.to_string(),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for key in [
            "PAYMENT_PROCESS_TIMEOUT_MS",
            "ORDER_TOTAL_TTL_SECS",
            "ORDER_TOTAL_WAIT_MS",
            "PAYMENT_CARD_NUMBER",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        assert_eq!(PaymentConfig::from_env(), PaymentConfig::default());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        unsafe {
            std::env::set_var("PAYMENT_PROCESS_TIMEOUT_MS", "250");
            std::env::set_var("ORDER_TOTAL_TTL_SECS", "60");
            std::env::set_var("ORDER_TOTAL_WAIT_MS", "0");
            std::env::set_var("PAYMENT_CARD_NUMBER", "4000000000000002");
        }

        let config = PaymentConfig::from_env();
        assert_eq!(config.process_timeout, Duration::from_millis(250));
        assert_eq!(config.order_total_ttl, Duration::from_secs(60));
        assert_eq!(config.order_total_wait, Duration::ZERO);
        assert_eq!(config.card_number, "4000000000000002");
        clear();
    }

    #[test]
    #[serial]
    fn test_zero_timeout_falls_back() {
        clear();
        unsafe { std::env::set_var("PAYMENT_PROCESS_TIMEOUT_MS", "0") };
        assert_eq!(
            PaymentConfig::from_env().process_timeout,
            PaymentConfig::DEFAULT_PROCESS_TIMEOUT
        );
        clear();
    }
}
