//! Common error types for the ovn-cni plugin.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`CniError`].
pub type CniResult<T> = Result<T, CniError>;

/// Errors raised while attaching or detaching a container.
#[derive(Error, Diagnostic, Debug)]
pub enum CniError {
    /// Container ID cannot be used to derive interface and port names.
    #[error("Invalid container ID: {id}")]
    #[diagnostic(
        code(ovn_cni::container::invalid_id),
        help(
            "Container IDs must be at least 12 characters of alphanumerics, '-', '_' or '.', starting with an alphanumeric"
        )
    )]
    InvalidContainerId {
        /// The rejected container ID.
        id: String,
    },

    /// Network namespace path could not be opened.
    #[error("Network namespace not found: {path}: {message}")]
    #[diagnostic(code(ovn_cni::netns::not_found))]
    NamespaceNotFound {
        /// The namespace path.
        path: String,
        /// Underlying OS error.
        message: String,
    },

    /// Network namespace exists but cannot be entered or targeted.
    #[error("Invalid network namespace {path}: {message}")]
    #[diagnostic(
        code(ovn_cni::netns::invalid),
        help("The path must refer to a network namespace, e.g. /var/run/netns/<name>")
    )]
    NamespaceInvalid {
        /// The namespace path.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// A link with the requested name already exists.
    #[error("Link already exists: {name}")]
    #[diagnostic(code(ovn_cni::link::exists))]
    LinkExists {
        /// The conflicting link name.
        name: String,
    },

    /// A link could not be found in the active namespace.
    #[error("Link not found: {name}")]
    #[diagnostic(code(ovn_cni::link::not_found))]
    LinkNotFound {
        /// The missing link name.
        name: String,
    },

    /// A link exists but does not carry the expected configuration.
    #[error("Link {name} is misconfigured: {message}")]
    #[diagnostic(
        code(ovn_cni::link::mismatch),
        help("Run DEL and ADD again to rebuild the attachment")
    )]
    LinkMismatch {
        /// The link name.
        name: String,
        /// What differs.
        message: String,
    },

    /// Malformed IPv4 address literal.
    #[error("Invalid IPv4 address: {value}")]
    #[diagnostic(
        code(ovn_cni::address::invalid_ip),
        help("Use CIDR notation, e.g. 10.100.1.2/24")
    )]
    AddressParse {
        /// The rejected literal.
        value: String,
    },

    /// Malformed hardware address literal.
    #[error("Invalid MAC address: {value}")]
    #[diagnostic(
        code(ovn_cni::address::invalid_mac),
        help("Use six colon-separated hex octets, e.g. 00:02:00:00:00:01")
    )]
    MacParse {
        /// The rejected literal.
        value: String,
    },

    /// A netlink request failed.
    #[error("Netlink {operation} failed: {message}")]
    #[diagnostic(code(ovn_cni::netlink))]
    Netlink {
        /// The operation that failed.
        operation: String,
        /// The netlink error.
        message: String,
    },

    /// Attaching a port to the integration bridge failed.
    #[error("Failed to attach {port} to bridge {bridge}: {output}")]
    #[diagnostic(code(ovn_cni::bridge::attach_failed))]
    BridgeAttachFailed {
        /// Bridge name.
        bridge: String,
        /// Interface being attached.
        port: String,
        /// Combined output of the switch tool.
        output: String,
    },

    /// Removing a port from the integration bridge failed.
    #[error("Failed to detach {port} from bridge {bridge}: {output}")]
    #[diagnostic(code(ovn_cni::bridge::detach_failed))]
    BridgeDetachFailed {
        /// Bridge name.
        bridge: String,
        /// Interface being detached.
        port: String,
        /// Combined output of the switch tool.
        output: String,
    },

    /// The OVN remote could not be read from the local switch.
    #[error("OVN endpoint unavailable: {output}")]
    #[diagnostic(
        code(ovn_cni::topology::endpoint_unavailable),
        help("Check that external_ids:ovn-remote is set on the Open_vSwitch table")
    )]
    EndpointUnavailable {
        /// Combined output of the switch tool.
        output: String,
    },

    /// A northbound database operation failed.
    #[error("OVN {operation} failed: {output}")]
    #[diagnostic(code(ovn_cni::topology::op_failed))]
    TopologyOpFailed {
        /// The ovn-nbctl command that failed.
        operation: String,
        /// Combined output of the topology tool.
        output: String,
    },

    /// An external tool could not be started at all.
    #[error("Failed to execute {program}: {message}")]
    #[diagnostic(
        code(ovn_cni::tool::spawn),
        help("Make sure ovs-vsctl and ovn-nbctl are installed and on PATH")
    )]
    ToolSpawn {
        /// The program that could not be spawned.
        program: String,
        /// Underlying OS error.
        message: String,
    },

    /// Requested CNI version is not supported.
    #[error("Unsupported CNI version: {version}")]
    #[diagnostic(code(ovn_cni::cni::unsupported_version))]
    UnsupportedVersion {
        /// The requested version.
        version: String,
    },

    /// A required CNI environment variable is missing or malformed.
    #[error("Invalid CNI environment: {message}")]
    #[diagnostic(code(ovn_cni::cni::invalid_environment))]
    InvalidEnvironment {
        /// The error message.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(ovn_cni::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(ovn_cni::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(ovn_cni::serialization))]
    Serialization(String),
}

impl CniError {
    /// Error code reported to the container runtime.
    ///
    /// Codes below 100 are reserved by the CNI specification; the rest are
    /// plugin specific.
    #[must_use]
    pub const fn cni_code(&self) -> u32 {
        match self {
            Self::UnsupportedVersion { .. } => 1,
            Self::InvalidContainerId { .. } | Self::InvalidEnvironment { .. } => 4,
            Self::Io(_) | Self::ToolSpawn { .. } => 5,
            Self::Serialization(_) => 6,
            Self::Config { .. } => 7,
            Self::NamespaceNotFound { .. } | Self::NamespaceInvalid { .. } => 100,
            Self::LinkExists { .. }
            | Self::LinkNotFound { .. }
            | Self::LinkMismatch { .. }
            | Self::Netlink { .. } => 101,
            Self::AddressParse { .. } | Self::MacParse { .. } => 102,
            Self::BridgeAttachFailed { .. } | Self::BridgeDetachFailed { .. } => 103,
            Self::EndpointUnavailable { .. } | Self::TopologyOpFailed { .. } => 104,
        }
    }

    /// Shorthand for a [`CniError::Netlink`] error.
    pub fn netlink(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Netlink {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CniError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
