//! Container attachment workflow.
//!
//! Attach walks `Start -> VethCreated -> NamespaceConfigured -> BridgeAttached
//! -> TopologyRegistered -> Done` and stops at the first error without rolling
//! anything back; the runtime is expected to call Detach afterwards. Detach
//! runs the same steps in reverse and never fails.
//!
//! Nothing is persisted between the two: every name is rebuilt from the
//! container ID.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use ovn_cni_common::{CniError, CniResult, ContainerId, Ipv4Cidr, MacAddress};
use ovn_cni_network::{
    BridgeIntegrator, INTEGRATION_BRIDGE, LOGICAL_SWITCH, LinkManager, LogicalSwitchPort, OvsPort,
    SwitchClient, TopologyClient, VethPair, port_name,
};

use crate::logging::LogContext;

/// Address assigned to every container interface.
pub const CONTAINER_ADDRESS: &str = "10.100.1.2/24";

/// Hardware address assigned to every container interface.
pub const CONTAINER_MAC: &str = "00:02:00:00:00:01";

/// Gateway reported for every container.
pub const GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 100, 1, 1);

/// One ADD/DEL/CHECK invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRequest {
    /// Container the attachment belongs to.
    pub container_id: ContainerId,
    /// Path of the container's network namespace.
    pub netns: PathBuf,
}

impl AttachmentRequest {
    /// Build a request, validating the container ID.
    pub fn new(container_id: &str, netns: impl Into<PathBuf>) -> CniResult<Self> {
        Ok(Self {
            container_id: ContainerId::new(container_id)?,
            netns: netns.into(),
        })
    }
}

/// Addressing handed to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedAddress {
    /// Interface address and prefix.
    pub address: Ipv4Cidr,
    /// Default gateway.
    pub gateway: Ipv4Addr,
    /// Interface hardware address.
    pub mac: MacAddress,
}

impl AssignedAddress {
    /// The fixed single-tenant addressing.
    ///
    /// # Errors
    ///
    /// Returns [`CniError::AddressParse`] or [`CniError::MacParse`] if the
    /// built-in literals are malformed.
    pub fn fixed() -> CniResult<Self> {
        Ok(Self {
            address: CONTAINER_ADDRESS.parse()?,
            gateway: GATEWAY,
            mac: CONTAINER_MAC.parse()?,
        })
    }
}

/// Everything Attach created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The veth pair; `container` lives in the target namespace.
    pub veth: VethPair,
    /// The host-side port on the integration bridge.
    pub port: OvsPort,
    /// The logical switch port bound to `port`.
    pub logical_port: LogicalSwitchPort,
    /// Addressing of the container interface.
    pub address: AssignedAddress,
}

/// Progress of an Attach call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttachState {
    /// Nothing created yet.
    Start,
    /// Veth pair exists and the host end is up.
    VethCreated,
    /// Container end moved into the namespace and configured.
    NamespaceConfigured,
    /// Host end is a port on the integration bridge.
    BridgeAttached,
    /// Logical switch port exists with its addresses.
    TopologyRegistered,
    /// Attach finished.
    Done,
}

impl fmt::Display for AttachState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "Start",
            Self::VethCreated => "VethCreated",
            Self::NamespaceConfigured => "NamespaceConfigured",
            Self::BridgeAttached => "BridgeAttached",
            Self::TopologyRegistered => "TopologyRegistered",
            Self::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Bridge and logical switch a workflow attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// OVS integration bridge.
    pub bridge: String,
    /// OVN logical switch.
    pub logical_switch: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bridge: INTEGRATION_BRIDGE.to_string(),
            logical_switch: LOGICAL_SWITCH.to_string(),
        }
    }
}

/// Attaches containers to the OVS/OVN dataplane.
pub struct AttachmentWorkflow<L, S> {
    links: L,
    switch: S,
    settings: NetworkSettings,
    log: LogContext,
}

impl<L: LinkManager, S: SwitchClient> AttachmentWorkflow<L, S> {
    /// Create a workflow with the default bridge and logical switch.
    pub fn new(links: L, switch: S, log: LogContext) -> Self {
        Self {
            links,
            switch,
            settings: NetworkSettings::default(),
            log,
        }
    }

    /// Use a different bridge or logical switch.
    #[must_use]
    pub fn with_settings(mut self, settings: NetworkSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The link manager.
    pub const fn links(&self) -> &L {
        &self.links
    }

    /// The switch client.
    pub const fn switch(&self) -> &S {
        &self.switch
    }

    /// The logging context every operation runs in.
    pub const fn log(&self) -> &LogContext {
        &self.log
    }

    /// Attach a container to the network.
    ///
    /// # Errors
    ///
    /// Returns the first error hit. State created before the failure is left
    /// in place for a later [`detach`](Self::detach).
    pub fn attach(&self, request: &AttachmentRequest) -> CniResult<Attachment> {
        self.log.scope(|| {
            let span = tracing::info_span!("attach", container_id = %request.container_id);
            let _enter = span.enter();

            let mut state = AttachState::Start;
            let result = self.run_attach(request, &mut state);
            match &result {
                Ok(_) => tracing::info!("Attach completed"),
                Err(e) => tracing::error!(%state, error = %e, "Attach failed"),
            }
            result
        })
    }

    fn run_attach(
        &self,
        request: &AttachmentRequest,
        state: &mut AttachState,
    ) -> CniResult<Attachment> {
        let address = AssignedAddress::fixed()?;
        let names = VethPair::for_container(&request.container_id);
        let port = port_name(&request.container_id);
        let bridge = BridgeIntegrator::new(&self.switch, &self.settings.bridge);
        let topology = TopologyClient::new(&self.switch, &self.settings.logical_switch);

        tracing::info!(
            host = %names.host,
            container = %names.container,
            netns = %request.netns.display(),
            "Attaching container"
        );

        let netns = self.links.resolve_namespace(&request.netns)?;

        self.clear_stale_host_state(&bridge, &names);

        let veth = self.links.create_veth_pair(&names.host, &names.container)?;
        self.links.set_link_up(&veth.host)?;
        advance(state, AttachState::VethCreated);

        self.links.with_namespace(&netns, |links| {
            if links.delete_link(&veth.container)? {
                tracing::info!(name = %veth.container, "Deleted existing link in target namespace");
            }
            Ok(())
        })?;
        self.links.move_link_to_namespace(&veth.container, &netns)?;

        // The link has to be in the namespace before it can be found there.
        self.links.with_namespace(&netns, |links| {
            links.configure_link(&veth.container, address.address, address.mac)
        })?;
        tracing::info!(
            name = %veth.container,
            address = %address.address,
            mac = %address.mac,
            "Configured container interface"
        );
        advance(state, AttachState::NamespaceConfigured);

        let ovs_port = bridge.attach_port(&veth.host, &port)?;
        advance(state, AttachState::BridgeAttached);

        let endpoint = topology.resolve_northbound_endpoint()?;
        let logical_port =
            topology.register_port(&endpoint, &port, address.mac, address.address.addr)?;
        advance(state, AttachState::TopologyRegistered);

        advance(state, AttachState::Done);
        Ok(Attachment {
            veth,
            port: ovs_port,
            logical_port,
            address,
        })
    }

    /// Remove leftovers of an earlier Attach of the same container.
    ///
    /// A pair whose container end never left the host namespace blocks the
    /// next create under the same peer name, so that name is cleared too.
    fn clear_stale_host_state(&self, bridge: &BridgeIntegrator<'_, S>, names: &VethPair) {
        for name in [&names.host, &names.container] {
            match self.links.delete_link(name) {
                Ok(true) => tracing::info!(name = %name, "Deleted existing interface"),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Failed to delete existing interface");
                }
            }
        }

        if let Err(e) = bridge.detach_port(&names.host) {
            tracing::warn!(name = %names.host, error = %e, "Failed to remove existing bridge port");
        }
    }

    /// Detach a container from the network.
    ///
    /// Every step is attempted; failures are logged and skipped.
    pub fn detach(&self, request: &AttachmentRequest) {
        self.log.scope(|| {
            let span = tracing::info_span!("detach", container_id = %request.container_id);
            let _enter = span.enter();

            let names = VethPair::for_container(&request.container_id);
            let port = port_name(&request.container_id);
            let bridge = BridgeIntegrator::new(&self.switch, &self.settings.bridge);
            let topology = TopologyClient::new(&self.switch, &self.settings.logical_switch);

            tracing::info!(host = %names.host, port = %port, "Detaching container");

            match topology.resolve_northbound_endpoint() {
                Ok(endpoint) => {
                    if let Err(e) = topology.remove_port(&endpoint, &port) {
                        tracing::warn!(port = %port, error = %e, "Failed to delete logical switch port");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get ovn-remote, skipping OVN cleanup");
                }
            }

            if let Err(e) = bridge.detach_port(&names.host) {
                tracing::warn!(name = %names.host, error = %e, "Failed to remove port from bridge");
            }

            // Deleting the host end destroys the container end too.
            match self.links.delete_link(&names.host) {
                Ok(true) => tracing::info!(name = %names.host, "Deleted interface"),
                Ok(false) => {
                    tracing::info!(name = %names.host, "Interface not found (may already be deleted)");
                }
                Err(e) => tracing::warn!(name = %names.host, error = %e, "Failed to delete interface"),
            }

            tracing::info!("Detach completed");
        });
    }

    /// Verify an attachment is still in place.
    ///
    /// Only the kernel side is checked: the host link exists and the
    /// container link carries exactly the assigned address and MAC and is up.
    pub fn check(&self, request: &AttachmentRequest) -> CniResult<()> {
        self.log.scope(|| {
            let span = tracing::info_span!("check", container_id = %request.container_id);
            let _enter = span.enter();

            let result = self.run_check(request);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Check failed");
            }
            result
        })
    }

    fn run_check(&self, request: &AttachmentRequest) -> CniResult<()> {
        let address = AssignedAddress::fixed()?;
        let names = VethPair::for_container(&request.container_id);

        if self.links.inspect_link(&names.host)?.is_none() {
            return Err(CniError::LinkNotFound { name: names.host });
        }

        let netns = self.links.resolve_namespace(&request.netns)?;
        let link = self
            .links
            .with_namespace(&netns, |links| links.inspect_link(&names.container))?
            .ok_or_else(|| CniError::LinkNotFound {
                name: names.container.clone(),
            })?;

        let mismatch = |message: String| CniError::LinkMismatch {
            name: names.container.clone(),
            message,
        };
        if !link.up {
            return Err(mismatch("interface is down".to_string()));
        }
        if link.mac != Some(address.mac) {
            return Err(mismatch(format!("expected MAC {}", address.mac)));
        }
        if link.ipv4 != [address.address] {
            return Err(mismatch(format!(
                "expected exactly one IPv4 address {}",
                address.address
            )));
        }

        tracing::debug!(netns = %request.netns.display(), "Attachment verified");
        Ok(())
    }
}

fn advance(state: &mut AttachState, next: AttachState) {
    tracing::debug!(from = %*state, to = %next, "State transition");
    *state = next;
}
