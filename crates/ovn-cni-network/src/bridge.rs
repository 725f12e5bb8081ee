//! Open vSwitch integration bridge management.
//!
//! This module wires host-side links into the integration bridge and tags
//! them so OVN can bind the port to its logical switch port.

use ovn_cni_common::CniResult;

use crate::switch::SwitchClient;

/// Default integration bridge.
pub const INTEGRATION_BRIDGE: &str = "br-int";

/// A port on the integration bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvsPort {
    /// Bridge the port lives on.
    pub bridge: String,
    /// Interface plugged into the bridge (the host-side veth).
    pub iface: String,
    /// Value of `external_ids:iface-id`, equal to the logical port name.
    pub external_id: String,
}

/// Attaches and detaches ports on one bridge.
pub struct BridgeIntegrator<'a, C> {
    client: &'a C,
    name: &'a str,
}

impl<'a, C: SwitchClient> BridgeIntegrator<'a, C> {
    /// Integrator for `bridge`.
    pub const fn new(client: &'a C, bridge: &'a str) -> Self {
        Self {
            client,
            name: bridge,
        }
    }

    /// Get the bridge name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name
    }

    /// Add `iface` to the bridge and stamp it with `external_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ovn_cni_common::CniError::BridgeAttachFailed`] with the
    /// tool output if either step fails.
    pub fn attach_port(&self, iface: &str, external_id: &str) -> CniResult<OvsPort> {
        tracing::debug!(bridge = %self.name, iface, external_id, "Adding port to bridge");

        self.client.create_port(self.name, iface, external_id)?;

        tracing::info!(bridge = %self.name, iface, external_id, "Port added to bridge");
        Ok(OvsPort {
            bridge: self.name.to_string(),
            iface: iface.to_string(),
            external_id: external_id.to_string(),
        })
    }

    /// Remove `iface` from the bridge. A missing port counts as removed.
    pub fn detach_port(&self, iface: &str) -> CniResult<()> {
        tracing::debug!(bridge = %self.name, iface, "Removing port from bridge");

        if self.client.delete_port(self.name, iface)? {
            tracing::info!(bridge = %self.name, iface, "Port removed from bridge");
        } else {
            tracing::debug!(bridge = %self.name, iface, "Port not on bridge (may not exist)");
        }

        Ok(())
    }
}
