use inventory::InventoryConfig;
use messaging::MessagingConfig;
use payments::PaymentConfig;

/// Settings for every service the platform runs.
#[derive(Debug, Clone, Default)]
pub struct PlatformConfig {
    pub messaging: MessagingConfig,
    pub inventory: InventoryConfig,
    pub payment: PaymentConfig,
}

impl PlatformConfig {
    /// Loads each part from its own environment variables.
    pub fn from_env() -> Self {
        Self {
            messaging: MessagingConfig::from_env(),
            inventory: InventoryConfig::from_env(),
            payment: PaymentConfig::from_env(),
        }
    }
}
