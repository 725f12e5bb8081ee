//! Virtual ethernet pair naming.
//!
//! Names are pure functions of the container ID: they are the only record
//! linking a container to its host link and ports, so Detach rebuilds them
//! instead of looking anything up.

use ovn_cni_common::ContainerId;

/// Name of the interface inside every container namespace.
pub const CONTAINER_IFNAME: &str = "veth0";

/// Prefix of the host-side link name.
pub const HOST_LINK_PREFIX: &str = "veth-";

/// Prefix of the OVS interface ID and OVN logical port name.
pub const PORT_PREFIX: &str = "pod-";

/// Virtual ethernet pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// Host-side interface name.
    pub host: String,
    /// Container-side interface name.
    pub container: String,
}

impl VethPair {
    /// Pair for a container: `veth-<id[:12]>` on the host, `veth0` inside.
    #[must_use]
    pub fn for_container(id: &ContainerId) -> Self {
        Self {
            host: format!("{HOST_LINK_PREFIX}{}", id.short()),
            container: CONTAINER_IFNAME.to_string(),
        }
    }
}

/// Port name shared by the OVS `external_ids:iface-id` and the OVN logical
/// switch port, `pod-<id[:12]>`.
#[must_use]
pub fn port_name(id: &ContainerId) -> String {
    format!("{PORT_PREFIX}{}", id.short())
}
