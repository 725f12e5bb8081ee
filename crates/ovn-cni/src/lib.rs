//! # ovn-cni
//!
//! A CNI plugin that attaches a container to an Open vSwitch integration
//! bridge and registers it as a logical switch port in OVN.
//!
//! ## Usage
//!
//! ```no_run
//! use ovn_cni::logging::LogContext;
//! use ovn_cni::workflow::{AttachmentRequest, AttachmentWorkflow};
//! use ovn_cni_network::{NetlinkLinkManager, OvsTools};
//!
//! # fn example() -> ovn_cni_common::CniResult<()> {
//! let workflow = AttachmentWorkflow::new(
//!     NetlinkLinkManager::new()?,
//!     OvsTools::new(),
//!     LogContext::stderr("info")?,
//! );
//!
//! let request = AttachmentRequest::new("abcdef0123456789", "/var/run/netns/test1")?;
//! let attachment = workflow.attach(&request)?;
//! println!("{} via {}", attachment.address.address, attachment.address.gateway);
//!
//! workflow.detach(&request);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cni;
pub mod config;
pub mod logging;
pub mod workflow;

pub use workflow::{AttachmentRequest, AttachmentWorkflow};
