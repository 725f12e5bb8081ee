//! CNI invocation contract.
//!
//! The runtime passes the command and container through `CNI_*` environment
//! variables and the network configuration on stdin, and expects a JSON
//! result (or error) on stdout.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use miette::Diagnostic;
use ovn_cni_common::{CniError, CniResult, Ipv4Cidr};
use ovn_cni_network::{CONTAINER_IFNAME, LinkManager, SwitchClient};
use serde::Serialize;

use crate::config::NetConf;
use crate::workflow::{Attachment, AttachmentRequest, AttachmentWorkflow};

/// CNI specification version used when the runtime does not name one.
pub const CNI_VERSION: &str = "1.0.0";

/// CNI specification versions this plugin can answer.
pub const SUPPORTED_VERSIONS: &[&str] = &["0.3.0", "0.3.1", "0.4.0", "1.0.0", "1.1.0"];

/// CNI operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CniCommand {
    /// Attach a container.
    #[value(name = "ADD")]
    Add,
    /// Detach a container.
    #[value(name = "DEL")]
    Del,
    /// Verify an attachment.
    #[value(name = "CHECK")]
    Check,
    /// Report supported versions.
    #[value(name = "VERSION")]
    Version,
}

/// ovn-cni - attach containers to an OVN logical switch
#[derive(Debug, Parser)]
#[command(name = "ovn-cni")]
#[command(author, version, about, long_about = None)]
pub struct CniArgs {
    /// Operation to perform
    #[arg(long, env = "CNI_COMMAND", value_enum)]
    pub command: CniCommand,

    /// Container ID
    #[arg(long, env = "CNI_CONTAINERID")]
    pub container_id: Option<String>,

    /// Path to the container network namespace
    #[arg(long, env = "CNI_NETNS")]
    pub netns: Option<PathBuf>,

    /// Interface name requested by the runtime
    #[arg(long, env = "CNI_IFNAME")]
    pub ifname: Option<String>,

    /// Extra plugin arguments
    #[arg(long, env = "CNI_ARGS")]
    pub args: Option<String>,

    /// Plugin search path
    #[arg(long, env = "CNI_PATH")]
    pub path: Option<String>,
}

impl CniArgs {
    fn container_id(&self) -> CniResult<&str> {
        self.container_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CniError::InvalidEnvironment {
                message: "CNI_CONTAINERID is required".to_string(),
            })
    }

    fn netns(&self) -> CniResult<PathBuf> {
        self.netns
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| CniError::InvalidEnvironment {
                message: "CNI_NETNS is required".to_string(),
            })
    }
}

/// Reject CNI versions the plugin cannot answer.
pub fn ensure_supported(version: &str) -> CniResult<()> {
    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(CniError::UnsupportedVersion {
            version: version.to_string(),
        })
    }
}

/// Run one CNI command.
///
/// Returns the JSON document to print on stdout, if the command has one.
pub fn execute<L: LinkManager, S: SwitchClient>(
    args: &CniArgs,
    conf: &NetConf,
    workflow: &AttachmentWorkflow<L, S>,
) -> CniResult<Option<String>> {
    match args.command {
        CniCommand::Version => Ok(Some(serde_json::to_string(&VersionResult::current())?)),
        CniCommand::Add => {
            let request = AttachmentRequest::new(args.container_id()?, args.netns()?)?;
            if let Some(ifname) = args.ifname.as_deref().filter(|name| *name != CONTAINER_IFNAME) {
                workflow
                    .log()
                    .scope(|| tracing::debug!(ifname, "Requested interface name is ignored"));
            }
            let attachment = workflow.attach(&request)?;
            let result = AddResult::new(&conf.cni_version, &request, &attachment);
            Ok(Some(serde_json::to_string(&result)?))
        }
        CniCommand::Del => {
            // DEL must succeed even for containers ADD never saw.
            let container_id = args.container_id.as_deref().unwrap_or_default();
            let netns = args.netns.clone().unwrap_or_default();
            match AttachmentRequest::new(container_id, netns) {
                Ok(request) => workflow.detach(&request),
                Err(e) => workflow
                    .log()
                    .scope(|| tracing::warn!(error = %e, "Nothing to detach")),
            }
            Ok(None)
        }
        CniCommand::Check => {
            let request = AttachmentRequest::new(args.container_id()?, args.netns()?)?;
            workflow.check(&request)?;
            Ok(None)
        }
    }
}

/// Result of `VERSION`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResult {
    /// Version of this document.
    pub cni_version: &'static str,
    /// Versions the plugin supports.
    pub supported_versions: &'static [&'static str],
}

impl VersionResult {
    /// Versions supported by this build.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            cni_version: CNI_VERSION,
            supported_versions: SUPPORTED_VERSIONS,
        }
    }
}

/// Result of a successful `ADD`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResult {
    /// Version the result is formatted for.
    pub cni_version: String,
    /// Interfaces created.
    pub interfaces: Vec<InterfaceResult>,
    /// Addresses assigned.
    pub ips: Vec<IpResult>,
    /// DNS settings (always empty).
    pub dns: DnsResult,
}

/// An interface in an [`AddResult`].
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceResult {
    /// Interface name.
    pub name: String,
    /// Hardware address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Namespace path, for interfaces inside the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

/// An address in an [`AddResult`].
#[derive(Debug, Clone, Serialize)]
pub struct IpResult {
    /// Address family, only present in 0.3.x/0.4.x results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
    /// Address with prefix.
    pub address: Ipv4Cidr,
    /// Gateway.
    pub gateway: Ipv4Addr,
    /// Index into `interfaces`.
    pub interface: usize,
}

/// DNS section of an [`AddResult`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DnsResult {}

impl AddResult {
    /// Format an attachment for the runtime.
    #[must_use]
    pub fn new(cni_version: &str, request: &AttachmentRequest, attachment: &Attachment) -> Self {
        let legacy = cni_version.starts_with("0.");

        Self {
            cni_version: cni_version.to_string(),
            interfaces: vec![
                InterfaceResult {
                    name: attachment.veth.host.clone(),
                    mac: None,
                    sandbox: None,
                },
                InterfaceResult {
                    name: attachment.veth.container.clone(),
                    mac: Some(attachment.address.mac.to_string()),
                    sandbox: Some(request.netns.display().to_string()),
                },
            ],
            ips: vec![IpResult {
                version: legacy.then_some("4"),
                address: attachment.address.address,
                gateway: attachment.address.gateway,
                interface: 1,
            }],
            dns: DnsResult::default(),
        }
    }
}

/// Error document printed on failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    /// Version of this document.
    pub cni_version: String,
    /// CNI error code.
    pub code: u32,
    /// Error message.
    pub msg: String,
    /// Extra detail, from the error's help text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResult {
    /// Describe `err` for the runtime.
    #[must_use]
    pub fn new(cni_version: &str, err: &CniError) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            code: err.cni_code(),
            msg: err.to_string(),
            details: err.help().map(|help| help.to_string()),
        }
    }
}
