use serde::{Deserialize, Serialize};
use zyvega_common::address::UnicastAddress;
use zyvega_common::CompanyIdentifier;
use zyvega_models::foundation::configuration::{AppKeyIndex, NetKeyIndex};
use zyvega_models::vendor::ZHIYUN_COMPANY;

/// Knobs shared by the mesh and direct control paths.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    pub net_key_index: NetKeyIndex,
    pub app_key_index: AppKeyIndex,
    pub scan_seconds: u16,
    /// First address handed to a provisioned node. The provisioner holds
    /// everything below it.
    pub first_unicast: UnicastAddress,
    pub company_id: CompanyIdentifier,
    /// Device id placed in ZYBL control payloads until the light reports
    /// its own.
    pub default_device_id: u16,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            net_key_index: NetKeyIndex::new(0),
            app_key_index: AppKeyIndex::new(0),
            scan_seconds: 10,
            first_unicast: UnicastAddress::PROVISIONER.checked_add(1).unwrap_or_default(),
            company_id: ZHIYUN_COMPANY,
            default_device_id: 0,
        }
    }
}
