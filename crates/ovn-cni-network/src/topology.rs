//! OVN northbound topology client.
//!
//! The local switch only knows the southbound remote (`external_ids:ovn-remote`,
//! port 6642). The northbound database listens on the same host at 6641.

use std::net::Ipv4Addr;

use ovn_cni_common::{CniResult, MacAddress};

use crate::switch::SwitchClient;

/// Default logical switch.
pub const LOGICAL_SWITCH: &str = "ls1";

/// Southbound database port.
pub const SOUTHBOUND_PORT: &str = "6642";

/// Northbound database port.
pub const NORTHBOUND_PORT: &str = "6641";

/// A logical switch port in the northbound database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSwitchPort {
    /// Switch the port belongs to.
    pub switch: String,
    /// Port name, equal to the OVS `iface-id`.
    pub name: String,
    /// Bound hardware address.
    pub mac: MacAddress,
    /// Bound IPv4 address.
    pub ip: Ipv4Addr,
}

/// Derive the northbound endpoint from a raw `ovn-remote` value.
///
/// Surrounding quotes and newlines printed by `ovs-vsctl` are stripped. Each
/// comma-separated remote on the southbound port is moved to the northbound
/// port; other remotes are passed through unchanged.
#[must_use]
pub fn northbound_endpoint(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\n')
        .split(',')
        .map(|remote| match remote.strip_suffix(SOUTHBOUND_PORT) {
            Some(prefix) if prefix.ends_with(':') => format!("{prefix}{NORTHBOUND_PORT}"),
            _ => remote.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Manages logical switch ports on one logical switch.
pub struct TopologyClient<'a, C> {
    client: &'a C,
    switch: &'a str,
}

impl<'a, C: SwitchClient> TopologyClient<'a, C> {
    /// Client for `switch`.
    pub const fn new(client: &'a C, switch: &'a str) -> Self {
        Self { client, switch }
    }

    /// Query the local switch for its OVN remote and derive the northbound
    /// endpoint from it.
    ///
    /// # Errors
    ///
    /// Returns [`ovn_cni_common::CniError::EndpointUnavailable`] if the
    /// query fails.
    pub fn resolve_northbound_endpoint(&self) -> CniResult<String> {
        let raw = self.client.query_endpoint()?;
        let endpoint = northbound_endpoint(&raw);
        tracing::debug!(remote = %raw.trim(), %endpoint, "Using OVN NB database");
        Ok(endpoint)
    }

    /// Create the logical port and bind its addresses.
    ///
    /// Any leftover port with the same name is removed first.
    pub fn register_port(
        &self,
        endpoint: &str,
        port: &str,
        mac: MacAddress,
        ip: Ipv4Addr,
    ) -> CniResult<LogicalSwitchPort> {
        self.client.delete_logical_port(endpoint, self.switch, port)?;

        self.client.create_logical_port(endpoint, self.switch, port)?;
        tracing::info!(switch = %self.switch, port, "Added logical switch port");

        self.client.set_addresses(endpoint, port, mac, ip)?;
        tracing::info!(port, %mac, %ip, "Set logical switch port addresses");

        Ok(LogicalSwitchPort {
            switch: self.switch.to_string(),
            name: port.to_string(),
            mac,
            ip,
        })
    }

    /// Delete the logical port; absence is not an error.
    pub fn remove_port(&self, endpoint: &str, port: &str) -> CniResult<()> {
        self.client.delete_logical_port(endpoint, self.switch, port)?;
        tracing::info!(switch = %self.switch, port, "Removed logical switch port");
        Ok(())
    }
}
