//! Network configuration read from the CNI runtime.

use std::path::PathBuf;

use ovn_cni_common::{CniError, CniResult};
use ovn_cni_network::switch::{OVN_NBCTL, OVS_VSCTL};
use ovn_cni_network::{INTEGRATION_BRIDGE, LOGICAL_SWITCH};
use serde::{Deserialize, Serialize};

/// Default log file.
pub const DEFAULT_LOG_FILE: &str = "/tmp/ovn-cni.log";

/// Plugin network configuration, passed as JSON on stdin.
///
/// Every field except the CNI envelope (`cniVersion`, `name`, `type`) is
/// optional; the defaults describe the standard single-switch deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetConf {
    /// CNI specification version the runtime speaks.
    pub cni_version: String,
    /// Network name.
    pub name: String,
    /// Plugin type.
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// OVS integration bridge.
    pub bridge: String,
    /// OVN logical switch.
    pub logical_switch: String,
    /// Log file path.
    pub log_file: PathBuf,
    /// Log level filter.
    pub log_level: String,
    /// `ovs-vsctl` program.
    pub ovs_vsctl: String,
    /// `ovn-nbctl` program.
    pub ovn_nbctl: String,
}

impl Default for NetConf {
    fn default() -> Self {
        Self {
            cni_version: crate::cni::CNI_VERSION.to_string(),
            name: String::new(),
            plugin_type: String::new(),
            bridge: INTEGRATION_BRIDGE.to_string(),
            logical_switch: LOGICAL_SWITCH.to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_level: "info".to_string(),
            ovs_vsctl: OVS_VSCTL.to_string(),
            ovn_nbctl: OVN_NBCTL.to_string(),
        }
    }
}

impl NetConf {
    /// Parse and validate a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CniError::Serialization`] for malformed JSON and
    /// [`CniError::Config`] for empty required values.
    pub fn from_slice(bytes: &[u8]) -> CniResult<Self> {
        let conf: Self = serde_json::from_slice(bytes)?;
        conf.validate()?;
        Ok(conf)
    }

    fn validate(&self) -> CniResult<()> {
        for (field, value) in [
            ("bridge", &self.bridge),
            ("logicalSwitch", &self.logical_switch),
            ("ovsVsctl", &self.ovs_vsctl),
            ("ovnNbctl", &self.ovn_nbctl),
        ] {
            if value.trim().is_empty() {
                return Err(CniError::Config {
                    message: format!("{field} must not be empty"),
                });
            }
        }
        Ok(())
    }
}
