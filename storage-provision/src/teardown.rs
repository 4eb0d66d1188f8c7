// SPDX-License-Identifier: GPL-3.0-only

//! Releasing the mounts and kernel mappings a run leaves behind
//!
//! Teardown is never run automatically. It walks the stack top down: mounts under the
//! target root (deepest first), swap, the volume group, encryption mappings, arrays.
//! Objects that do not exist are skipped and failures are collected, not raised.

use std::path::{Path, PathBuf};

use storage_sys::logical::{lvm_tools, mdadm_tools};
use storage_sys::mounts::mounts_under;
use storage_sys::{Host, SysError, ToolCommand, filesystem, luks};
use storage_types::{InstallPlan, PartitionRole, Strategy};
use tracing::{debug, info, warn};

use crate::partition_table::plan_partitions;
use crate::paths::{
    BOOT_ARRAY, DATA_ARRAY, array_path, logical_volume_path, mapper_path, partition_path,
    volume_group_path,
};

#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Rendered commands that succeeded
    pub released: Vec<String>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<SysError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn release<H: Host>(host: &mut H, report: &mut TeardownReport, object: &Path, command: ToolCommand) {
    if !host.path_exists(object) {
        debug!("{} not present, skipping", object.display());
        report.skipped.push(object.to_path_buf());
        return;
    }

    let rendered = command.render();
    info!("teardown: {rendered}");
    match host.run(&command) {
        Ok(_) => report.released.push(rendered),
        Err(error) => {
            warn!("teardown step failed: {error}");
            report.failures.push(error);
        }
    }
}

/// Best-effort release of everything `plan` sets up
pub fn teardown<H: Host>(host: &mut H, plan: &InstallPlan) -> TeardownReport {
    let mut report = TeardownReport::default();

    match host
        .read_mountinfo()
        .and_then(|info| mounts_under(&info, &plan.target_root))
    {
        Ok(mounts) => {
            for mount in mounts {
                release(host, &mut report, &mount, filesystem::umount(&mount));
            }
        }
        Err(error) => {
            warn!("cannot list mounts under {}: {error}", plan.target_root.display());
            report.failures.push(error);
        }
    }

    match &plan.strategy {
        Strategy::Simple | Strategy::SimpleLuks(_) => {
            if plan.swap.enabled
                && let Some(disk) = plan.disks.first()
                && let Some(spec) = plan_partitions(disk, plan)
                    .into_iter()
                    .find(|spec| spec.role == PartitionRole::Swap)
            {
                let swap = partition_path(disk, spec.index);
                release(host, &mut report, &swap, filesystem::swapoff(&swap));
            }
        }
        Strategy::RaidLuks(_) => {}
        Strategy::RaidLvm(lvm) | Strategy::RaidLvmLuks { lvm, .. } => {
            let group = lvm.volume_group.as_str();
            if plan.swap.enabled {
                let swap = logical_volume_path(group, "swap");
                release(host, &mut report, &swap, filesystem::swapoff(&swap));
            }
            release(
                host,
                &mut report,
                &volume_group_path(group),
                lvm_tools::vgchange_deactivate(group),
            );
        }
    }

    if let Some(encryption) = plan.strategy.encryption() {
        for mapper in [&encryption.home_mapper, &encryption.root_mapper] {
            release(host, &mut report, &mapper_path(mapper), luks::close(mapper));
        }
    }

    if plan.strategy.is_raid() {
        for number in [DATA_ARRAY, BOOT_ARRAY] {
            let array = array_path(number);
            release(host, &mut report, &array, mdadm_tools::stop_array(&array));
        }
    }

    info!(
        "teardown finished: {} released, {} skipped, {} failed",
        report.released.len(),
        report.skipped.len(),
        report.failures.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use storage_sys::RecordingHost;
    use storage_types::{BootMode, EncryptionOptions, LvmOptions};

    use super::*;

    const MOUNTS: &str = "36 25 8:2 / / rw - ext4 /dev/nvme0n1p2 rw\n\
        90 36 9:1 / /mnt rw - ext4 /dev/vg0/root rw\n\
        91 90 9:0 / /mnt/boot rw - vfat /dev/md0 rw\n\
        92 91 8:1 / /mnt/boot/efi rw - vfat /dev/sda1 rw\n";

    #[test]
    fn releases_raid_stack_top_down() {
        let plan = InstallPlan::new(
            vec![PathBuf::from("/dev/sda"), PathBuf::from("/dev/sdb")],
            BootMode::Firmware,
            Strategy::RaidLvm(LvmOptions::default()),
        );
        let mut host = RecordingHost::new().with_mountinfo(MOUNTS);

        let report = teardown(&mut host, &plan);
        assert!(report.is_clean());
        assert_eq!(
            host.commands(),
            vec![
                "umount /mnt/boot/efi",
                "umount /mnt/boot",
                "umount /mnt",
                "vgchange --activate n vg0",
                "mdadm --stop /dev/md1",
                "mdadm --stop /dev/md0",
            ]
        );
    }

    #[test]
    fn skips_absent_mappings_and_keeps_going_after_failures() {
        let plan = InstallPlan::new(
            vec![PathBuf::from("/dev/sda")],
            BootMode::Legacy,
            Strategy::SimpleLuks(EncryptionOptions::with_passphrase("pw")),
        );
        let mut host = RecordingHost::new()
            .with_mountinfo(MOUNTS)
            .with_missing_path("/dev/mapper/crypthome")
            .with_failure("umount", "/mnt/boot/efi");

        let report = teardown(&mut host, &plan);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.skipped, vec![PathBuf::from("/dev/mapper/crypthome")]);
        assert_eq!(
            host.commands().last().map(String::as_str),
            Some("cryptsetup close cryptroot")
        );
    }
}
