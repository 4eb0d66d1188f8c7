#![allow(dead_code)]

use std::path::PathBuf;

use storage_sys::{HostAction, RecordingHost};
use storage_types::{BootMode, InstallPlan, Strategy};

pub fn plan(disks: &[&str], boot_mode: BootMode, strategy: Strategy) -> InstallPlan {
    InstallPlan::new(
        disks.iter().map(PathBuf::from).collect(),
        boot_mode,
        strategy,
    )
}

/// Commands of `program`, in issue order
pub fn commands_of(host: &RecordingHost, program: &str) -> Vec<String> {
    let prefix = format!("{program} ");
    host.commands()
        .into_iter()
        .filter(|command| command.starts_with(&prefix))
        .collect()
}

/// Mount targets in issue order
pub fn mount_targets(host: &RecordingHost) -> Vec<String> {
    commands_of(host, "mount")
        .into_iter()
        .filter_map(|command| command.rsplit(' ').next().map(ToString::to_string))
        .collect()
}

/// Position of the first command containing `fragment`
pub fn position(host: &RecordingHost, fragment: &str) -> Option<usize> {
    host.commands()
        .iter()
        .position(|command| command.contains(fragment))
}

pub fn created_dirs(host: &RecordingHost) -> Vec<PathBuf> {
    host.actions()
        .iter()
        .filter_map(|action| match action {
            HostAction::CreateDir(path) => Some(path.clone()),
            _ => None,
        })
        .collect()
}
