// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem formatter

use std::path::{Path, PathBuf};

use storage_sys::logical::btrfs_tools;
use storage_sys::{Host, filesystem};
use storage_types::{BlockDeviceNode, FilesystemType, FormattedVolume, InstallPlan, VolumeRole};
use tracing::{debug, info};

use crate::compositor::DeviceStack;
use crate::error::{Result, Step};
use crate::step::{create_dir, run_step};

/// Subvolumes created on a btrfs root volume
pub const ROOT_SUBVOLUMES: [&str; 4] = ["@", "@home", "@var", "@tmp"];
/// Subvolumes created on a separate btrfs home volume
pub const HOME_SUBVOLUMES: [&str; 1] = ["@home"];

/// Everything the formatter produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedStack {
    pub volumes: Vec<FormattedVolume>,
    /// Swap area, activated after mounting
    pub swap: Option<PathBuf>,
}

impl FormattedStack {
    pub fn volume(&self, role: VolumeRole) -> Option<&FormattedVolume> {
        self.volumes.iter().find(|volume| volume.role == role)
    }
}

fn subvolumes_for(role: VolumeRole, filesystem: FilesystemType) -> &'static [&'static str] {
    if !filesystem.supports_subvolumes() {
        return &[];
    }
    match role {
        VolumeRole::Root => &ROOT_SUBVOLUMES,
        VolumeRole::Home => &HOME_SUBVOLUMES,
        _ => &[],
    }
}

/// Filesystem the plan asks for on a volume role, `None` for swap
pub fn filesystem_for(plan: &InstallPlan, role: VolumeRole) -> Option<FilesystemType> {
    match role {
        VolumeRole::Root => Some(plan.root_filesystem),
        VolumeRole::Home => Some(plan.home_filesystem().unwrap_or(plan.root_filesystem)),
        VolumeRole::Boot => Some(plan.boot_mode.boot_filesystem()),
        VolumeRole::Esp => Some(FilesystemType::Vfat),
        VolumeRole::Swap => None,
    }
}

/// Create subvolumes by mounting the fresh filesystem at the target root for the duration
fn create_subvolumes<H: Host>(
    host: &mut H,
    device: &Path,
    subvolumes: &[&str],
    scratch: &Path,
) -> Result<()> {
    create_dir(host, Step::CreateSubvolume, scratch)?;
    run_step(
        host,
        Step::CreateSubvolume,
        device,
        filesystem::mount(device, scratch, None),
    )?;

    for name in subvolumes {
        run_step(
            host,
            Step::CreateSubvolume,
            device,
            btrfs_tools::subvolume_create(&scratch.join(name)),
        )?;
    }

    run_step(host, Step::CreateSubvolume, device, filesystem::umount(scratch))?;
    Ok(())
}

/// Create `filesystem` on a finished node
pub fn format<H: Host>(
    host: &mut H,
    node: &BlockDeviceNode,
    role: VolumeRole,
    filesystem: FilesystemType,
    target_root: &Path,
) -> Result<FormattedVolume> {
    let device = node.path();
    info!("formatting {} ({role}) as {filesystem}", device.display());
    run_step(host, Step::Format, device, filesystem::mkfs(device, filesystem))?;

    let subvolumes = subvolumes_for(role, filesystem);
    if !subvolumes.is_empty() {
        create_subvolumes(host, device, subvolumes, target_root)?;
    }

    Ok(FormattedVolume {
        node: node.clone(),
        role,
        filesystem,
        subvolumes: subvolumes.iter().map(ToString::to_string).collect(),
        mount_point: None,
    })
}

/// Format every volume of the stack
pub fn format_stack<H: Host>(
    host: &mut H,
    plan: &InstallPlan,
    stack: &DeviceStack,
) -> Result<FormattedStack> {
    let mut formatted = FormattedStack::default();

    for node in stack.volumes() {
        let Some(role) = node.role else { continue };

        match filesystem_for(plan, role) {
            Some(filesystem) => {
                let volume = format(host, node, role, filesystem, &plan.target_root)?;
                formatted.volumes.push(volume);
            }
            None => {
                debug!("initialising swap on {}", node.path().display());
                run_step(host, Step::Format, node.path(), filesystem::mkswap(node.path()))?;
                formatted.swap = Some(node.path.clone());
            }
        }
    }

    Ok(formatted)
}
