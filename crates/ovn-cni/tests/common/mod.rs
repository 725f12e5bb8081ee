//! In-memory stand-ins for the kernel and the OVS/OVN tools.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use ovn_cni::logging::LogContext;
use ovn_cni::workflow::AttachmentWorkflow;
use ovn_cni_common::{CniError, CniResult, Ipv4Cidr, MacAddress};
use ovn_cni_network::{CommandOutput, CommandRunner, LinkManager, LinkState, SwitchClient, VethPair};

/// Name of the namespace the plugin starts in.
pub const HOST: &str = "host";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLink {
    pub up: bool,
    pub mac: Option<MacAddress>,
    pub ipv4: Vec<Ipv4Cidr>,
    /// Namespace and name of the other end of a veth pair.
    pub peer: Option<(String, String)>,
}

impl FakeLink {
    fn veth(peer_ns: &str, peer: &str) -> Self {
        Self {
            up: false,
            mac: None,
            ipv4: Vec::new(),
            peer: Some((peer_ns.to_string(), peer.to_string())),
        }
    }
}

/// Links per namespace, keyed by namespace name.
///
/// A namespace path resolves to the namespace named after its file name.
#[derive(Debug)]
pub struct FakeLinks {
    namespaces: RefCell<BTreeMap<String, BTreeMap<String, FakeLink>>>,
    current: RefCell<String>,
    failing: RefCell<BTreeSet<&'static str>>,
    ops: RefCell<Vec<String>>,
}

impl FakeLinks {
    pub fn new() -> Self {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(HOST.to_string(), BTreeMap::new());
        Self {
            namespaces: RefCell::new(namespaces),
            current: RefCell::new(HOST.to_string()),
            failing: RefCell::new(BTreeSet::new()),
            ops: RefCell::new(Vec::new()),
        }
    }

    /// Create an empty namespace.
    pub fn with_namespace_named(self, name: &str) -> Self {
        self.namespaces
            .borrow_mut()
            .insert(name.to_string(), BTreeMap::new());
        self
    }

    /// Make every call of `operation` fail with a netlink error.
    pub fn fail(&self, operation: &'static str) {
        self.failing.borrow_mut().insert(operation);
    }

    pub fn heal(&self, operation: &'static str) {
        self.failing.borrow_mut().remove(operation);
    }

    /// Put a link directly into a namespace.
    pub fn insert(&self, ns: &str, name: &str, link: FakeLink) {
        self.namespaces
            .borrow_mut()
            .entry(ns.to_string())
            .or_default()
            .insert(name.to_string(), link);
    }

    pub fn link(&self, ns: &str, name: &str) -> Option<FakeLink> {
        self.namespaces
            .borrow()
            .get(ns)
            .and_then(|links| links.get(name))
            .cloned()
    }

    pub fn links_in(&self, ns: &str) -> Vec<String> {
        self.namespaces
            .borrow()
            .get(ns)
            .map(|links| links.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    /// Operations in call order, as `op name@namespace`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.borrow().clone()
    }

    fn record(&self, operation: &'static str, name: &str) -> CniResult<()> {
        self.ops
            .borrow_mut()
            .push(format!("{operation} {name}@{}", self.current()));
        if self.failing.borrow().contains(operation) {
            return Err(CniError::netlink(operation, "injected failure"));
        }
        Ok(())
    }

    fn update(&self, name: &str, f: impl FnOnce(&mut FakeLink)) -> CniResult<()> {
        let current = self.current();
        let mut namespaces = self.namespaces.borrow_mut();
        let link = namespaces
            .get_mut(&current)
            .and_then(|links| links.get_mut(name))
            .ok_or_else(|| CniError::LinkNotFound {
                name: name.to_string(),
            })?;
        f(link);
        Ok(())
    }
}

impl LinkManager for FakeLinks {
    type Namespace = String;

    fn resolve_namespace(&self, path: &Path) -> CniResult<String> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.namespaces.borrow().contains_key(&name) && name != HOST {
            Ok(name)
        } else {
            Err(CniError::NamespaceNotFound {
                path: path.display().to_string(),
                message: "No such file or directory (os error 2)".to_string(),
            })
        }
    }

    fn with_namespace<R>(
        &self,
        ns: &String,
        f: impl FnOnce(&Self) -> CniResult<R>,
    ) -> CniResult<R> {
        let previous = self.current.replace(ns.clone());
        let result = f(self);
        self.current.replace(previous);
        result
    }

    fn create_veth_pair(&self, host: &str, peer: &str) -> CniResult<VethPair> {
        self.record("create_veth_pair", host)?;
        let current = self.current();
        let mut namespaces = self.namespaces.borrow_mut();
        let links = namespaces.entry(current.clone()).or_default();
        for name in [peer, host] {
            if links.contains_key(name) {
                return Err(CniError::LinkExists {
                    name: name.to_string(),
                });
            }
        }
        links.insert(host.to_string(), FakeLink::veth(&current, peer));
        links.insert(peer.to_string(), FakeLink::veth(&current, host));
        Ok(VethPair {
            host: host.to_string(),
            container: peer.to_string(),
        })
    }

    fn set_link_up(&self, name: &str) -> CniResult<()> {
        self.record("set_link_up", name)?;
        self.update(name, |link| link.up = true)
    }

    fn move_link_to_namespace(&self, name: &str, ns: &String) -> CniResult<()> {
        self.record("move_link_to_namespace", name)?;
        let current = self.current();
        let mut namespaces = self.namespaces.borrow_mut();

        if namespaces
            .get(ns)
            .is_some_and(|links| links.contains_key(name))
        {
            return Err(CniError::LinkExists {
                name: name.to_string(),
            });
        }
        let mut link = namespaces
            .get_mut(&current)
            .and_then(|links| links.remove(name))
            .ok_or_else(|| CniError::LinkNotFound {
                name: name.to_string(),
            })?;
        // Moving a link takes it down.
        link.up = false;

        if let Some(other) = link.peer.as_ref().and_then(|(peer_ns, peer)| {
            namespaces
                .get_mut(peer_ns)
                .and_then(|links| links.get_mut(peer))
        }) {
            other.peer = Some((ns.clone(), name.to_string()));
        }
        namespaces
            .entry(ns.clone())
            .or_default()
            .insert(name.to_string(), link);
        Ok(())
    }

    fn configure_link(&self, name: &str, address: Ipv4Cidr, mac: MacAddress) -> CniResult<()> {
        self.record("configure_link", name)?;
        self.update(name, |link| {
            link.up = true;
            link.mac = Some(mac);
            if !link.ipv4.contains(&address) {
                link.ipv4.push(address);
            }
        })
    }

    fn delete_link(&self, name: &str) -> CniResult<bool> {
        self.record("delete_link", name)?;
        let current = self.current();
        let mut namespaces = self.namespaces.borrow_mut();
        let Some(link) = namespaces
            .get_mut(&current)
            .and_then(|links| links.remove(name))
        else {
            return Ok(false);
        };
        if let Some((peer_ns, peer)) = link.peer {
            if let Some(links) = namespaces.get_mut(&peer_ns) {
                links.remove(&peer);
            }
        }
        Ok(true)
    }

    fn inspect_link(&self, name: &str) -> CniResult<Option<LinkState>> {
        self.record("inspect_link", name)?;
        Ok(self.link(&self.current(), name).map(|link| LinkState {
            up: link.up,
            mac: link.mac,
            ipv4: link.ipv4,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLogicalPort {
    pub switch: String,
    pub addresses: Option<(MacAddress, Ipv4Addr)>,
}

/// The local switch and the northbound database.
#[derive(Debug)]
pub struct FakeSwitch {
    /// Bridge ports, keyed by (bridge, interface), valued by `iface-id`.
    pub ports: RefCell<BTreeMap<(String, String), String>>,
    pub logical_ports: RefCell<BTreeMap<String, FakeLogicalPort>>,
    /// Raw `ovn-remote` value; `None` when unset.
    pub remote: RefCell<Option<String>>,
    /// Endpoints every northbound call was sent to.
    pub endpoints: RefCell<Vec<String>>,
    failing: RefCell<BTreeSet<&'static str>>,
}

impl FakeSwitch {
    pub fn new() -> Self {
        Self {
            ports: RefCell::new(BTreeMap::new()),
            logical_ports: RefCell::new(BTreeMap::new()),
            remote: RefCell::new(Some("\"tcp:172.18.0.2:6642\"\n".to_string())),
            endpoints: RefCell::new(Vec::new()),
            failing: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.borrow_mut().insert(operation);
    }

    pub fn heal(&self, operation: &'static str) {
        self.failing.borrow_mut().remove(operation);
    }

    pub fn port(&self, bridge: &str, iface: &str) -> Option<String> {
        self.ports
            .borrow()
            .get(&(bridge.to_string(), iface.to_string()))
            .cloned()
    }

    pub fn logical_port(&self, name: &str) -> Option<FakeLogicalPort> {
        self.logical_ports.borrow().get(name).cloned()
    }

    fn check(&self, operation: &'static str) -> CniResult<()> {
        if self.failing.borrow().contains(operation) {
            return Err(CniError::TopologyOpFailed {
                operation: operation.to_string(),
                output: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn northbound(&self, endpoint: &str, operation: &'static str) -> CniResult<()> {
        self.endpoints.borrow_mut().push(endpoint.to_string());
        self.check(operation)
    }
}

impl SwitchClient for FakeSwitch {
    fn create_port(&self, bridge: &str, iface: &str, iface_id: &str) -> CniResult<()> {
        let key = (bridge.to_string(), iface.to_string());
        if self.failing.borrow().contains("create_port") || self.ports.borrow().contains_key(&key)
        {
            return Err(CniError::BridgeAttachFailed {
                bridge: bridge.to_string(),
                port: iface.to_string(),
                output: format!("ovs-vsctl: cannot create a port named {iface}"),
            });
        }
        self.ports.borrow_mut().insert(key, iface_id.to_string());
        Ok(())
    }

    fn delete_port(&self, bridge: &str, iface: &str) -> CniResult<bool> {
        if self.failing.borrow().contains("delete_port") {
            return Err(CniError::BridgeDetachFailed {
                bridge: bridge.to_string(),
                port: iface.to_string(),
                output: "injected failure".to_string(),
            });
        }
        Ok(self
            .ports
            .borrow_mut()
            .remove(&(bridge.to_string(), iface.to_string()))
            .is_some())
    }

    fn query_endpoint(&self) -> CniResult<String> {
        match self.remote.borrow().clone() {
            Some(remote) if !self.failing.borrow().contains("query_endpoint") => Ok(remote),
            _ => Err(CniError::EndpointUnavailable {
                output: "ovs-vsctl: no key \"ovn-remote\" in Open_vSwitch record".to_string(),
            }),
        }
    }

    fn create_logical_port(&self, endpoint: &str, switch: &str, port: &str) -> CniResult<()> {
        self.northbound(endpoint, "lsp-add")?;
        if self.logical_ports.borrow().contains_key(port) {
            return Err(CniError::TopologyOpFailed {
                operation: "lsp-add".to_string(),
                output: format!("ovn-nbctl: {port}: a port with this name already exists"),
            });
        }
        self.logical_ports.borrow_mut().insert(
            port.to_string(),
            FakeLogicalPort {
                switch: switch.to_string(),
                addresses: None,
            },
        );
        Ok(())
    }

    fn delete_logical_port(&self, endpoint: &str, _switch: &str, port: &str) -> CniResult<()> {
        self.northbound(endpoint, "lsp-del")?;
        self.logical_ports.borrow_mut().remove(port);
        Ok(())
    }

    fn set_addresses(
        &self,
        endpoint: &str,
        port: &str,
        mac: MacAddress,
        ip: Ipv4Addr,
    ) -> CniResult<()> {
        self.northbound(endpoint, "lsp-set-addresses")?;
        let mut ports = self.logical_ports.borrow_mut();
        let lsp = ports
            .get_mut(port)
            .ok_or_else(|| CniError::TopologyOpFailed {
                operation: "lsp-set-addresses".to_string(),
                output: format!("ovn-nbctl: {port}: port name not found"),
            })?;
        lsp.addresses = Some((mac, ip));
        Ok(())
    }
}

/// Replays canned tool output and records every argv.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    pub calls: RefCell<Vec<String>>,
    replies: RefCell<VecDeque<CommandOutput>>,
}

impl ScriptedRunner {
    /// Reply to the calls in order; calls past the script succeed silently.
    pub fn replying(replies: impl IntoIterator<Item = CommandOutput>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            replies: RefCell::new(replies.into_iter().collect()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str]) -> CniResult<CommandOutput> {
        let mut argv = vec![program];
        argv.extend_from_slice(args);
        self.calls.borrow_mut().push(argv.join(" "));
        Ok(self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}

/// Workflow over fresh fakes with namespace `test1`.
pub fn workflow() -> AttachmentWorkflow<FakeLinks, FakeSwitch> {
    AttachmentWorkflow::new(
        FakeLinks::new().with_namespace_named("test1"),
        FakeSwitch::new(),
        LogContext::silent(),
    )
}

pub fn netns() -> PathBuf {
    PathBuf::from("/var/run/netns/test1")
}
