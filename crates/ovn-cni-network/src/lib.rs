//! # ovn-cni-network
//!
//! Networking primitives for the ovn-cni plugin.
//!
//! This crate wraps the three systems an attachment touches: kernel links
//! and network namespaces (rtnetlink), the Open vSwitch integration bridge
//! (`ovs-vsctl`) and the OVN northbound database (`ovn-nbctl`).

#![warn(missing_docs)]

pub mod bridge;
pub mod command;
pub mod link;
pub mod netns;
pub mod switch;
pub mod topology;
pub mod veth;

pub use bridge::{BridgeIntegrator, INTEGRATION_BRIDGE, OvsPort};
pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use link::{LinkManager, LinkState, NetlinkLinkManager};
pub use netns::NetNs;
pub use switch::{OvsTools, SwitchClient};
pub use topology::{LOGICAL_SWITCH, LogicalSwitchPort, TopologyClient, northbound_endpoint};
pub use veth::{CONTAINER_IFNAME, VethPair, port_name};
