//! Open vSwitch and OVN command-line clients.

use std::net::Ipv4Addr;

use ovn_cni_common::{CniError, CniResult, MacAddress};

use crate::command::{CommandRunner, SystemRunner};

/// Default `ovs-vsctl` program.
pub const OVS_VSCTL: &str = "ovs-vsctl";

/// Default `ovn-nbctl` program.
pub const OVN_NBCTL: &str = "ovn-nbctl";

/// Switch and topology database operations used by the attachment workflow.
pub trait SwitchClient {
    /// Add `iface` to `bridge` and tag it with `external_ids:iface-id`.
    fn create_port(&self, bridge: &str, iface: &str, iface_id: &str) -> CniResult<()>;

    /// Remove `iface` from `bridge`. Returns `false` if no such port existed.
    fn delete_port(&self, bridge: &str, iface: &str) -> CniResult<bool>;

    /// Read `external_ids:ovn-remote` from the local switch, unprocessed.
    fn query_endpoint(&self) -> CniResult<String>;

    /// Add a logical switch port.
    fn create_logical_port(&self, endpoint: &str, switch: &str, port: &str) -> CniResult<()>;

    /// Delete a logical switch port if it exists.
    fn delete_logical_port(&self, endpoint: &str, switch: &str, port: &str) -> CniResult<()>;

    /// Bind a MAC and IPv4 address to a logical switch port.
    fn set_addresses(
        &self,
        endpoint: &str,
        port: &str,
        mac: MacAddress,
        ip: Ipv4Addr,
    ) -> CniResult<()>;
}

/// [`SwitchClient`] shelling out to `ovs-vsctl` and `ovn-nbctl`.
#[derive(Debug, Clone)]
pub struct OvsTools<R = SystemRunner> {
    ovs_vsctl: String,
    ovn_nbctl: String,
    runner: R,
}

impl OvsTools {
    /// Client using the tools found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for OvsTools {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> OvsTools<R> {
    /// Client running the tools through `runner`.
    pub fn with_runner(runner: R) -> Self {
        Self {
            ovs_vsctl: OVS_VSCTL.to_string(),
            ovn_nbctl: OVN_NBCTL.to_string(),
            runner,
        }
    }

    /// Override the tool programs.
    #[must_use]
    pub fn with_programs(mut self, ovs_vsctl: impl Into<String>, ovn_nbctl: impl Into<String>) -> Self {
        self.ovs_vsctl = ovs_vsctl.into();
        self.ovn_nbctl = ovn_nbctl.into();
        self
    }

    fn nbctl(&self, endpoint: &str, args: &[&str]) -> CniResult<Result<String, String>> {
        let db = format!("--db={endpoint}");
        let mut argv = vec![db.as_str()];
        argv.extend_from_slice(args);

        let out = self.runner.run(&self.ovn_nbctl, &argv)?;
        Ok(if out.success {
            Ok(out.combined)
        } else {
            Err(out.combined)
        })
    }
}

impl<R: CommandRunner> SwitchClient for OvsTools<R> {
    fn create_port(&self, bridge: &str, iface: &str, iface_id: &str) -> CniResult<()> {
        let attach_failed = |output: String| CniError::BridgeAttachFailed {
            bridge: bridge.to_string(),
            port: iface.to_string(),
            output,
        };

        let out = self.runner.run(&self.ovs_vsctl, &["add-port", bridge, iface])?;
        if !out.success {
            return Err(attach_failed(out.combined));
        }

        let external_id = format!("external_ids:iface-id={iface_id}");
        let out = self
            .runner
            .run(&self.ovs_vsctl, &["set", "interface", iface, &external_id])?;
        if !out.success {
            return Err(attach_failed(out.combined));
        }

        Ok(())
    }

    fn delete_port(&self, bridge: &str, iface: &str) -> CniResult<bool> {
        let out = self.runner.run(&self.ovs_vsctl, &["del-port", bridge, iface])?;
        if out.success {
            return Ok(true);
        }
        if out.combined.contains("no port named") {
            return Ok(false);
        }
        Err(CniError::BridgeDetachFailed {
            bridge: bridge.to_string(),
            port: iface.to_string(),
            output: out.combined,
        })
    }

    fn query_endpoint(&self) -> CniResult<String> {
        let out = self.runner.run(
            &self.ovs_vsctl,
            &["get", "open_vswitch", ".", "external_ids:ovn-remote"],
        )?;
        if !out.success {
            return Err(CniError::EndpointUnavailable {
                output: out.combined,
            });
        }
        Ok(out.combined)
    }

    fn create_logical_port(&self, endpoint: &str, switch: &str, port: &str) -> CniResult<()> {
        self.nbctl(endpoint, &["lsp-add", switch, port])?
            .map(drop)
            .map_err(|output| CniError::TopologyOpFailed {
                operation: "lsp-add".to_string(),
                output,
            })
    }

    fn delete_logical_port(&self, endpoint: &str, _switch: &str, port: &str) -> CniResult<()> {
        self.nbctl(endpoint, &["--if-exists", "lsp-del", port])?
            .map(drop)
            .map_err(|output| CniError::TopologyOpFailed {
                operation: "lsp-del".to_string(),
                output,
            })
    }

    fn set_addresses(
        &self,
        endpoint: &str,
        port: &str,
        mac: MacAddress,
        ip: Ipv4Addr,
    ) -> CniResult<()> {
        let addresses = format!("{mac} {ip}");
        self.nbctl(endpoint, &["lsp-set-addresses", port, &addresses])?
            .map(drop)
            .map_err(|output| CniError::TopologyOpFailed {
                operation: "lsp-set-addresses".to_string(),
                output,
            })
    }
}
