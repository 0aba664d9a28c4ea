use std::time::Duration;

/// Inventory service settings.
///
/// Reads from environment variables:
/// - `RESERVATION_TTL_SECS`: reservation lifetime before auto-release;
///   `0` disables expiry (default: `900`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    pub reservation_ttl: Duration,
}

impl InventoryConfig {
    pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(15 * 60);

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let reservation_ttl = std::env::var("RESERVATION_TTL_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Self::DEFAULT_RESERVATION_TTL);
        Self { reservation_ttl }
    }

    /// Reservations never expire on their own.
    pub fn without_expiry() -> Self {
        Self {
            reservation_ttl: Duration::ZERO,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Self::DEFAULT_RESERVATION_TTL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env() {
        unsafe { std::env::remove_var("RESERVATION_TTL_SECS") };
        assert_eq!(
            InventoryConfig::from_env().reservation_ttl,
            Duration::from_secs(900)
        );

        unsafe { std::env::set_var("RESERVATION_TTL_SECS", "0") };
        assert!(InventoryConfig::from_env().reservation_ttl.is_zero());

        unsafe { std::env::set_var("RESERVATION_TTL_SECS", "not-a-number") };
        assert_eq!(
            InventoryConfig::from_env().reservation_ttl,
            Duration::from_secs(900)
        );
        unsafe { std::env::remove_var("RESERVATION_TTL_SECS") };
    }
}
