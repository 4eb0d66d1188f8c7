// SPDX-License-Identifier: GPL-3.0-only

//! Strategy selector
//!
//! [`execute_strategy`] validates a plan without touching any disk, then walks the
//! partition → compose → format → mount → identity sequence, stopping at the first
//! failure.

use std::collections::{BTreeSet, HashSet};

use storage_sys::Host;
use storage_sys::filesystem::mkfs_program;
use storage_types::{
    BootMode, DeviceIdentityRecord, FilesystemType, FormattedVolume, InstallPlan, MountEntry,
    Strategy,
};
use tracing::info;

use crate::compositor::{self, DeviceStack};
use crate::error::{PlanError, ProvisionError, Result};
use crate::formatter;
use crate::mounter;
use crate::partition_table::{self, DiskLayout};
use crate::registry;

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub identities: Vec<DeviceIdentityRecord>,
    pub mounts: Vec<MountEntry>,
    pub volumes: Vec<FormattedVolume>,
    pub layouts: Vec<DiskLayout>,
    pub stack: DeviceStack,
}

/// Fail with `NotImplemented` for strategies that have no device sequence yet
pub fn ensure_supported(strategy: &Strategy) -> Result<()> {
    match strategy {
        Strategy::Simple | Strategy::SimpleLuks(_) | Strategy::RaidLvm(_) => Ok(()),
        Strategy::RaidLuks(_) | Strategy::RaidLvmLuks { .. } => {
            Err(ProvisionError::NotImplemented {
                strategy: strategy.name(),
            })
        }
    }
}

/// Checks that need nothing but the plan itself
pub fn validate_plan(plan: &InstallPlan) -> std::result::Result<(), PlanError> {
    if plan.disks.is_empty() {
        return Err(PlanError::NoDisks);
    }

    let mut seen = HashSet::new();
    for disk in &plan.disks {
        if !disk.is_absolute() {
            return Err(PlanError::RelativeDisk(disk.clone()));
        }
        if !seen.insert(disk) {
            return Err(PlanError::DuplicateDisk(disk.clone()));
        }
    }

    let required = plan.strategy.disk_requirement();
    if !required.accepts(plan.disks.len()) {
        return Err(PlanError::DiskCount {
            strategy: plan.strategy.name(),
            required,
            actual: plan.disks.len(),
        });
    }

    if plan.swap.enabled && plan.swap.size.is_zero() {
        return Err(PlanError::ZeroSwap);
    }

    if let Some(encryption) = plan.strategy.encryption() {
        if encryption.passphrase.is_empty() {
            return Err(PlanError::MissingPassphrase(plan.strategy.name()));
        }
        for mapper in [&encryption.root_mapper, &encryption.home_mapper] {
            if mapper.trim().is_empty() || mapper.contains('/') {
                return Err(PlanError::MapperName(mapper.clone()));
            }
        }
        if encryption.root_mapper == encryption.home_mapper {
            return Err(PlanError::DuplicateMapper(encryption.root_mapper.clone()));
        }
    }

    if let Strategy::RaidLvm(lvm) | Strategy::RaidLvmLuks { lvm, .. } = &plan.strategy {
        if !(1..=99).contains(&lvm.root_percent_free) {
            return Err(PlanError::RootPercent(lvm.root_percent_free));
        }
        if lvm.volume_group.trim().is_empty() {
            return Err(PlanError::EmptyVolumeGroup);
        }
    }

    let sizing = &plan.sizing;
    if sizing.boot_mib == 0 {
        return Err(PlanError::Sizing("boot_mib must be greater than zero".to_string()));
    }
    if plan.boot_mode == BootMode::Firmware && sizing.esp_mib == 0 {
        return Err(PlanError::Sizing("esp_mib must be greater than zero".to_string()));
    }
    if plan.home.enabled && !plan.strategy.is_raid() && sizing.root_mib == 0 {
        return Err(PlanError::Sizing(
            "root_mib must be greater than zero when home has its own partition".to_string(),
        ));
    }
    if let Some(disk) = plan.disks.first()
        && partition_table::fixed_extent_mib(&partition_table::plan_partitions(disk, plan))
            .is_none()
    {
        return Err(PlanError::Sizing(
            "partition sizes exceed the addressable disk range".to_string(),
        ));
    }
    if plan.root_filesystem == FilesystemType::Vfat
        || plan.home_filesystem() == Some(FilesystemType::Vfat)
    {
        return Err(PlanError::Sizing(
            "vfat is reserved for boot locations".to_string(),
        ));
    }

    if !plan.target_root.is_absolute() {
        return Err(PlanError::RelativeTarget(plan.target_root.clone()));
    }

    Ok(())
}

/// External programs a run of `plan` will invoke
pub fn required_tools(plan: &InstallPlan) -> BTreeSet<&'static str> {
    let mut tools: BTreeSet<&'static str> =
        ["wipefs", "parted", "partprobe", "udevadm", "blkid", "mount", "umount"]
            .into_iter()
            .collect();

    let mut filesystems = vec![plan.root_filesystem, plan.boot_mode.boot_filesystem()];
    if plan.boot_mode == BootMode::Firmware {
        filesystems.push(FilesystemType::Vfat);
    }
    filesystems.extend(plan.home_filesystem());

    for filesystem in filesystems {
        tools.insert(mkfs_program(filesystem));
        if filesystem.supports_subvolumes() {
            tools.insert("btrfs");
        }
    }

    if plan.swap.enabled {
        tools.extend(["mkswap", "swapon"]);
    }
    if plan.strategy.encryption().is_some() {
        tools.insert("cryptsetup");
    }
    if plan.strategy.is_raid() {
        tools.insert("mdadm");
    }
    if plan.strategy.uses_lvm() {
        tools.extend(["pvcreate", "vgcreate", "lvcreate"]);
    }

    tools
}

/// Every check that runs before the first destructive command
pub fn preflight<H: Host>(host: &H, plan: &InstallPlan) -> Result<Vec<DiskLayout>> {
    ensure_supported(&plan.strategy)?;
    validate_plan(plan)?;

    for tool in required_tools(plan) {
        if !host.tool_available(tool) {
            return Err(PlanError::MissingTool(tool.to_string()).into());
        }
    }

    for disk in &plan.disks {
        if !host.path_exists(disk) {
            return Err(PlanError::MissingDisk(disk.clone()).into());
        }
    }

    Ok(partition_table::plan_layouts(plan)?)
}

/// Provision the plan's disks and return the captured identities
pub fn execute_strategy<H: Host>(host: &mut H, plan: &InstallPlan) -> Result<ProvisionOutcome> {
    let layouts = preflight(host, plan)?;
    info!(
        "provisioning {} disk(s) with strategy {} ({} boot)",
        plan.disks.len(),
        plan.strategy,
        plan.boot_mode
    );

    partition_table::build_partitions(host, &layouts)?;
    let stack = compositor::compose(host, plan, &layouts)?;
    let mut formatted = formatter::format_stack(host, plan, &stack)?;
    let mounts = mounter::mount_all(host, plan, &mut formatted)?;
    compositor::write_array_descriptor(host, plan, &stack)?;
    let identities = registry::capture_all(host, plan.boot_mode, &formatted.volumes, &stack)?;

    info!(
        "provisioning finished: {} volumes mounted, {} identities captured",
        formatted.volumes.len(),
        identities.len()
    );

    Ok(ProvisionOutcome {
        identities,
        mounts,
        volumes: formatted.volumes,
        layouts,
        stack,
    })
}
