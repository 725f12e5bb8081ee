//! Link management over rtnetlink.
//!
//! Every operation resolves links by name in whichever namespace the calling
//! thread is in when the operation starts. A fresh netlink socket is opened
//! per operation, so an operation run inside [`LinkManager::with_namespace`]
//! talks to the target namespace.

use std::net::IpAddr;
use std::os::fd::AsRawFd;
use std::path::Path;

use futures::TryStreamExt;
use ovn_cni_common::{CniError, CniResult, Ipv4Cidr, MacAddress};
use rtnetlink::packet_route::address::AddressAttribute;
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};
use rtnetlink::{Handle, LinkUnspec, LinkVeth};
use tokio::runtime::Runtime;

use crate::netns::NetNs;
use crate::veth::VethPair;

/// Observed state of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    /// Administratively up.
    pub up: bool,
    /// Hardware address, if the link has one.
    pub mac: Option<MacAddress>,
    /// IPv4 addresses assigned to the link.
    pub ipv4: Vec<Ipv4Cidr>,
}

/// Kernel link operations, scoped to the currently active namespace.
pub trait LinkManager {
    /// Handle to a network namespace.
    type Namespace;

    /// Open the namespace at `path`.
    fn resolve_namespace(&self, path: &Path) -> CniResult<Self::Namespace>;

    /// Run `f` with `ns` as the active namespace, restoring the caller's
    /// namespace afterwards.
    fn with_namespace<R>(
        &self,
        ns: &Self::Namespace,
        f: impl FnOnce(&Self) -> CniResult<R>,
    ) -> CniResult<R>;

    /// Create a veth pair; both ends are born in the active namespace.
    fn create_veth_pair(&self, host: &str, peer: &str) -> CniResult<VethPair>;

    /// Set a link administratively up.
    fn set_link_up(&self, name: &str) -> CniResult<()>;

    /// Move a link from the active namespace into `ns`.
    fn move_link_to_namespace(&self, name: &str, ns: &Self::Namespace) -> CniResult<()>;

    /// Bring a link up and assign an IPv4 address and hardware address.
    fn configure_link(&self, name: &str, address: Ipv4Cidr, mac: MacAddress) -> CniResult<()>;

    /// Delete a link. Returns `false` if there was nothing to delete.
    fn delete_link(&self, name: &str) -> CniResult<bool>;

    /// Read the state of a link, `None` if it does not exist.
    fn inspect_link(&self, name: &str) -> CniResult<Option<LinkState>>;
}

/// [`LinkManager`] backed by rtnetlink on a single-threaded runtime.
///
/// The runtime never leaves the calling thread, which keeps every netlink
/// socket in the namespace that thread has entered.
pub struct NetlinkLinkManager {
    runtime: Runtime,
}

impl NetlinkLinkManager {
    /// Create a new link manager.
    pub fn new() -> CniResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;
        Ok(Self { runtime })
    }
}

impl LinkManager for NetlinkLinkManager {
    type Namespace = NetNs;

    fn resolve_namespace(&self, path: &Path) -> CniResult<NetNs> {
        NetNs::open(path)
    }

    fn with_namespace<R>(
        &self,
        ns: &NetNs,
        f: impl FnOnce(&Self) -> CniResult<R>,
    ) -> CniResult<R> {
        ns.run(|| f(self))
    }

    fn create_veth_pair(&self, host: &str, peer: &str) -> CniResult<VethPair> {
        tracing::debug!(host, peer, "Creating veth pair");

        self.runtime.block_on(async {
            let handle = connect()?;
            match handle
                .link()
                .add(LinkVeth::new(host, peer).build())
                .execute()
                .await
            {
                Ok(()) => {}
                Err(rtnetlink::Error::NetlinkError(e)) if e.raw_code() == -libc::EEXIST => {
                    let name = if link_index(&handle, peer).await?.is_some() {
                        peer
                    } else {
                        host
                    };
                    return Err(CniError::LinkExists {
                        name: name.to_string(),
                    });
                }
                Err(e) => return Err(CniError::netlink(format!("add veth {host}"), e)),
            }

            Ok(VethPair {
                host: host.to_string(),
                container: peer.to_string(),
            })
        })
    }

    fn set_link_up(&self, name: &str) -> CniResult<()> {
        tracing::debug!(name, "Bringing link up");

        self.runtime.block_on(async {
            let handle = connect()?;
            let index = require_index(&handle, name).await?;
            set_up(&handle, name, index).await
        })
    }

    fn move_link_to_namespace(&self, name: &str, ns: &NetNs) -> CniResult<()> {
        tracing::debug!(name, netns = %ns.path().display(), "Moving link to netns");

        self.runtime.block_on(async {
            let handle = connect()?;
            let index = require_index(&handle, name).await?;
            handle
                .link()
                .set(
                    LinkUnspec::new_with_index(index)
                        .setns_by_fd(ns.as_raw_fd())
                        .build(),
                )
                .execute()
                .await
                .map_err(|e| CniError::NamespaceInvalid {
                    path: ns.path().display().to_string(),
                    message: e.to_string(),
                })
        })
    }

    fn configure_link(&self, name: &str, address: Ipv4Cidr, mac: MacAddress) -> CniResult<()> {
        tracing::debug!(name, %address, %mac, "Configuring link");

        self.runtime.block_on(async {
            let handle = connect()?;
            let index = require_index(&handle, name).await?;

            set_up(&handle, name, index).await?;

            match handle
                .address()
                .add(index, IpAddr::V4(address.addr), address.prefix_len)
                .execute()
                .await
            {
                Ok(()) => {}
                Err(rtnetlink::Error::NetlinkError(e)) if e.raw_code() == -libc::EEXIST => {
                    tracing::debug!(name, %address, "Address already assigned");
                }
                Err(e) => return Err(CniError::netlink(format!("add address {address}"), e)),
            }

            handle
                .link()
                .set(
                    LinkUnspec::new_with_index(index)
                        .address(mac.octets().to_vec())
                        .build(),
                )
                .execute()
                .await
                .map_err(|e| CniError::netlink(format!("set address {mac} on {name}"), e))
        })
    }

    fn delete_link(&self, name: &str) -> CniResult<bool> {
        self.runtime.block_on(async {
            let handle = connect()?;
            let Some(index) = link_index(&handle, name).await? else {
                tracing::debug!(name, "Link not present, nothing to delete");
                return Ok(false);
            };

            match handle.link().del(index).execute().await {
                Ok(()) => {
                    tracing::debug!(name, "Deleted link");
                    Ok(true)
                }
                // Removed concurrently, e.g. with its peer.
                Err(rtnetlink::Error::NetlinkError(e)) if e.raw_code() == -libc::ENODEV => {
                    Ok(false)
                }
                Err(e) => Err(CniError::netlink(format!("delete link {name}"), e)),
            }
        })
    }

    fn inspect_link(&self, name: &str) -> CniResult<Option<LinkState>> {
        self.runtime.block_on(async {
            let handle = connect()?;
            let Some(link) = get_link(&handle, name).await? else {
                return Ok(None);
            };

            let mac = link.attributes.iter().find_map(|attr| match attr {
                LinkAttribute::Address(bytes) => MacAddress::from_bytes(bytes),
                _ => None,
            });

            let mut ipv4 = Vec::new();
            let mut addresses = handle
                .address()
                .get()
                .set_link_index_filter(link.header.index)
                .execute();
            while let Some(msg) = addresses
                .try_next()
                .await
                .map_err(|e| CniError::netlink(format!("list addresses of {name}"), e))?
            {
                for attr in &msg.attributes {
                    if let AddressAttribute::Address(IpAddr::V4(addr)) = attr {
                        ipv4.push(Ipv4Cidr::new(*addr, msg.header.prefix_len)?);
                    }
                }
            }

            Ok(Some(LinkState {
                up: link.header.flags.contains(LinkFlags::Up),
                mac,
                ipv4,
            }))
        })
    }
}

/// Open a netlink socket in the calling thread's namespace.
fn connect() -> CniResult<Handle> {
    let (connection, handle, _) =
        rtnetlink::new_connection().map_err(|e| CniError::netlink("connect", e))?;
    tokio::spawn(connection);
    Ok(handle)
}

async fn get_link(handle: &Handle, name: &str) -> CniResult<Option<LinkMessage>> {
    let mut links = handle.link().get().match_name(name.to_string()).execute();

    match links.try_next().await {
        Ok(link) => Ok(link),
        Err(rtnetlink::Error::NetlinkError(e)) if e.raw_code() == -libc::ENODEV => Ok(None),
        Err(e) => Err(CniError::netlink(format!("get link {name}"), e)),
    }
}

async fn link_index(handle: &Handle, name: &str) -> CniResult<Option<u32>> {
    Ok(get_link(handle, name).await?.map(|link| link.header.index))
}

async fn require_index(handle: &Handle, name: &str) -> CniResult<u32> {
    link_index(handle, name)
        .await?
        .ok_or_else(|| CniError::LinkNotFound {
            name: name.to_string(),
        })
}

async fn set_up(handle: &Handle, name: &str, index: u32) -> CniResult<()> {
    handle
        .link()
        .set(LinkUnspec::new_with_index(index).up().build())
        .execute()
        .await
        .map_err(|e| CniError::netlink(format!("set {name} up"), e))
}
