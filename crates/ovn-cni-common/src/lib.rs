//! # ovn-cni-common
//!
//! Shared types for the ovn-cni plugin:
//! - Error taxonomy and CNI error codes
//! - Container ID validation
//! - IPv4 and MAC address literals

#![warn(missing_docs)]

pub mod addr;
pub mod error;
pub mod id;

pub use addr::{Ipv4Cidr, MacAddress};
pub use error::{CniError, CniResult};
pub use id::ContainerId;
