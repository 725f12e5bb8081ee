//! ovn-cni plugin entry point.

use std::io::Read;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use ovn_cni_common::{CniError, CniResult};
use ovn_cni_network::{NetlinkLinkManager, OvsTools};

use ovn_cni::cni::{self, CNI_VERSION, CniArgs, CniCommand, ErrorResult, VersionResult};
use ovn_cni::config::NetConf;
use ovn_cni::logging::LogContext;
use ovn_cni::workflow::{AttachmentWorkflow, NetworkSettings};

fn main() -> ExitCode {
    let args = match CniArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            return report(
                CNI_VERSION,
                CniError::InvalidEnvironment {
                    message: e.to_string().trim_end().to_string(),
                },
            );
        }
    };

    // VERSION carries no network configuration.
    if args.command == CniCommand::Version {
        return match serde_json::to_string(&VersionResult::current()) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => report(CNI_VERSION, e.into()),
        };
    }

    let mut cni_version = CNI_VERSION.to_string();
    match run(&args, &mut cni_version) {
        Ok(Some(output)) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => report(&cni_version, e),
    }
}

fn run(args: &CniArgs, cni_version: &mut String) -> CniResult<Option<String>> {
    let mut stdin = Vec::new();
    std::io::stdin().read_to_end(&mut stdin)?;
    let conf = NetConf::from_slice(&stdin)?;
    cni::ensure_supported(&conf.cni_version)?;
    cni_version.clone_from(&conf.cni_version);

    // DEL has to succeed even when the plugin cannot set itself up.
    let tolerant = args.command == CniCommand::Del;

    let log = match LogContext::file(&conf.log_file, &conf.log_level) {
        Ok(log) => log,
        Err(e) if tolerant => {
            let log = LogContext::stderr(&conf.log_level).unwrap_or_else(|_| LogContext::silent());
            log.scope(|| tracing::warn!(error = %e, "Log file unavailable, logging to stderr"));
            log
        }
        Err(e) => return Err(e),
    };
    log.scope(|| {
        tracing::info!(
            command = ?args.command,
            container_id = args.container_id.as_deref().unwrap_or_default(),
            netns = ?args.netns,
            network = %conf.name,
            "Starting OVN CNI plugin"
        );
    });

    let links = match NetlinkLinkManager::new() {
        Ok(links) => links,
        Err(e) if tolerant => {
            log.scope(|| tracing::warn!(error = %e, "Nothing to detach"));
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let switch = OvsTools::new().with_programs(&conf.ovs_vsctl, &conf.ovn_nbctl);
    let workflow = AttachmentWorkflow::new(links, switch, log).with_settings(NetworkSettings {
        bridge: conf.bridge.clone(),
        logical_switch: conf.logical_switch.clone(),
    });

    let result = cni::execute(args, &conf, &workflow);
    if let Err(e) = &result {
        workflow
            .log()
            .scope(|| tracing::error!(code = e.cni_code(), error = %e, "Command failed"));
    }
    result
}

/// Print the CNI error document on stdout and a diagnostic on stderr.
fn report(cni_version: &str, err: CniError) -> ExitCode {
    match serde_json::to_string(&ErrorResult::new(cni_version, &err)) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to encode error result: {e}"),
    }
    eprintln!("{:?}", miette::Report::new(err));
    ExitCode::FAILURE
}
