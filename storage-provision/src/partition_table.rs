// SPDX-License-Identifier: GPL-3.0-only

//! Partition table builder
//!
//! Planning is pure: [`plan_layouts`] turns an [`InstallPlan`] into one [`DiskLayout`]
//! per disk and checks that every disk got the same shape. [`build_partitions`] then
//! wipes each disk, writes the table, creates the partitions in order and makes the
//! kernel re-read the table before any partition path is handed downstream.

use std::path::{Path, PathBuf};

use storage_sys::{Host, partition};
use storage_types::{
    BootMode, InstallPlan, PartitionRole, PartitionSize, PartitionSpec, PartitionTable,
    PartitionType, Strategy,
};
use tracing::info;

use crate::error::{PlanError, Result, Step};
use crate::paths::partition_path;
use crate::step::{require_device, run_step};

/// The planned partitions of one disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLayout {
    pub disk: PathBuf,
    pub table: PartitionTable,
    pub partitions: Vec<PartitionSpec>,
}

impl DiskLayout {
    pub fn with_role(&self, role: PartitionRole) -> impl Iterator<Item = &PartitionSpec> {
        self.partitions
            .iter()
            .filter(move |spec| spec.role == role)
    }

    pub fn first_with_role(&self, role: PartitionRole) -> Option<&PartitionSpec> {
        self.with_role(role).next()
    }

    /// Resolved device path of a planned partition
    pub fn device(&self, spec: &PartitionSpec) -> PathBuf {
        partition_path(&self.disk, spec.index)
    }

    fn same_shape(&self, other: &DiskLayout) -> bool {
        self.table == other.table
            && self.partitions.len() == other.partitions.len()
            && self
                .partitions
                .iter()
                .zip(&other.partitions)
                .all(|(a, b)| a.same_shape(b))
    }
}

struct LayoutCursor<'a> {
    disk: &'a Path,
    table: PartitionTable,
    offset: u64,
    partitions: Vec<PartitionSpec>,
}

struct Slot<'a> {
    kind: PartitionType,
    role: PartitionRole,
    name: &'a str,
    fs_hint: Option<&'a str>,
    flags: &'a [&'a str],
}

impl<'a> LayoutCursor<'a> {
    fn push(&mut self, size: PartitionSize, slot: Slot<'_>) {
        let index = self.partitions.len() as u32 + 1;
        let flags = slot
            .flags
            .iter()
            .filter(|flag| self.table == PartitionTable::Gpt || **flag != "swap")
            .map(|flag| flag.to_string())
            .collect();

        self.partitions.push(PartitionSpec {
            disk: self.disk.to_path_buf(),
            index,
            start_mib: self.offset,
            size,
            kind: slot.kind,
            role: slot.role,
            name: slot.name.to_string(),
            fs_hint: slot.fs_hint.map(ToString::to_string),
            flags,
        });

        if let PartitionSize::Mib(mib) = size {
            self.offset = self.offset.saturating_add(mib);
        }
    }
}

/// Plan the partitions of one disk
pub fn plan_partitions(disk: &Path, plan: &InstallPlan) -> Vec<PartitionSpec> {
    let sizing = &plan.sizing;
    let raid = plan.strategy.is_raid();
    let mut cursor = LayoutCursor {
        disk,
        table: plan.partition_table(),
        offset: sizing.alignment_mib,
        partitions: Vec::new(),
    };

    let boot_size = PartitionSize::Mib(sizing.boot_mib);
    match plan.boot_mode {
        BootMode::Firmware => {
            cursor.push(
                PartitionSize::Mib(sizing.esp_mib),
                Slot {
                    kind: PartitionType::EfiSystem,
                    role: PartitionRole::Esp,
                    name: "ESP",
                    fs_hint: Some("fat32"),
                    flags: &["esp"],
                },
            );
            let boot = if raid {
                Slot {
                    kind: PartitionType::Raid,
                    role: PartitionRole::Boot,
                    name: "XBOOTLDR",
                    fs_hint: None,
                    flags: &["raid"],
                }
            } else {
                Slot {
                    kind: PartitionType::ExtendedBoot,
                    role: PartitionRole::Boot,
                    name: "XBOOTLDR",
                    fs_hint: Some("fat32"),
                    flags: &["bls_boot"],
                }
            };
            cursor.push(boot_size, boot);
        }
        BootMode::Legacy => {
            let boot = if raid {
                Slot {
                    kind: PartitionType::Raid,
                    role: PartitionRole::Boot,
                    name: "boot",
                    fs_hint: None,
                    flags: &["boot", "raid"],
                }
            } else {
                Slot {
                    kind: PartitionType::LegacyBoot,
                    role: PartitionRole::Boot,
                    name: "boot",
                    fs_hint: Some("ext4"),
                    flags: &["boot"],
                }
            };
            cursor.push(boot_size, boot);
        }
    }

    if !plan.strategy.uses_lvm()
        && let Some(size) = plan.swap.requested()
    {
        cursor.push(
            PartitionSize::Mib(size.get()),
            Slot {
                kind: PartitionType::Swap,
                role: PartitionRole::Swap,
                name: "swap",
                fs_hint: Some("linux-swap"),
                flags: &["swap"],
            },
        );
    }

    let root_hint = plan.root_filesystem.parted_hint();
    let home_hint = plan
        .home_filesystem()
        .map(|filesystem| filesystem.parted_hint())
        .unwrap_or(root_hint);

    match &plan.strategy {
        Strategy::Simple | Strategy::SimpleLuks(_) => {
            let (kind, role, root_hint, home_hint) = match &plan.strategy {
                Strategy::SimpleLuks(_) => {
                    (PartitionType::Luks, PartitionRole::LuksMember, None, None)
                }
                _ => (
                    PartitionType::Linux,
                    PartitionRole::Data,
                    Some(root_hint),
                    Some(home_hint),
                ),
            };

            if plan.home.enabled {
                cursor.push(
                    PartitionSize::Mib(plan.sizing.root_mib),
                    Slot {
                        kind,
                        role,
                        name: "root",
                        fs_hint: root_hint,
                        flags: &[],
                    },
                );
                cursor.push(
                    PartitionSize::Remaining,
                    Slot {
                        kind,
                        role,
                        name: "home",
                        fs_hint: home_hint,
                        flags: &[],
                    },
                );
            } else {
                cursor.push(
                    PartitionSize::Remaining,
                    Slot {
                        kind,
                        role,
                        name: "root",
                        fs_hint: root_hint,
                        flags: &[],
                    },
                );
            }
        }
        Strategy::RaidLvm(_) | Strategy::RaidLuks(_) | Strategy::RaidLvmLuks { .. } => {
            cursor.push(
                PartitionSize::Remaining,
                Slot {
                    kind: PartitionType::Raid,
                    role: PartitionRole::RaidMember,
                    name: "data",
                    fs_hint: None,
                    flags: &["raid"],
                },
            );
        }
    }

    cursor.partitions
}

/// End of the last fixed-size partition, `None` if the offsets overflow
pub fn fixed_extent_mib(partitions: &[PartitionSpec]) -> Option<u64> {
    partitions.iter().try_fold(0u64, |end, spec| match spec.size {
        PartitionSize::Mib(mib) => Some(end.max(spec.start_mib.checked_add(mib)?)),
        PartitionSize::Remaining => Some(end.max(spec.start_mib)),
    })
}

/// Plan every disk and require identical layouts so array members line up by index
pub fn plan_layouts(plan: &InstallPlan) -> std::result::Result<Vec<DiskLayout>, PlanError> {
    let layouts: Vec<DiskLayout> = plan
        .disks
        .iter()
        .map(|disk| DiskLayout {
            disk: disk.clone(),
            table: plan.partition_table(),
            partitions: plan_partitions(disk, plan),
        })
        .collect();

    if let Some((first, rest)) = layouts.split_first() {
        for other in rest {
            if !first.same_shape(other) {
                return Err(PlanError::AsymmetricLayout {
                    first: first.disk.clone(),
                    other: other.disk.clone(),
                });
            }
        }
    }

    Ok(layouts)
}

/// Wipe a disk and create its planned partitions
pub fn apply_layout<H: Host>(host: &mut H, layout: &DiskLayout) -> Result<()> {
    let disk = layout.disk.as_path();
    info!(
        "partitioning {} ({} table, {} partitions)",
        disk.display(),
        layout.table.label(),
        layout.partitions.len()
    );

    run_step(host, Step::WipeDisk, disk, partition::wipe_signatures(disk))?;
    run_step(
        host,
        Step::WritePartitionTable,
        disk,
        partition::make_label(disk, layout.table),
    )?;

    for spec in &layout.partitions {
        run_step(
            host,
            Step::CreatePartition,
            disk,
            partition::make_partition(spec, layout.table),
        )?;
        for flag in &spec.flags {
            run_step(
                host,
                Step::CreatePartition,
                disk,
                partition::set_flag(disk, spec.index, flag),
            )?;
        }
    }

    run_step(host, Step::RereadPartitions, disk, partition::reread(disk))?;
    run_step(host, Step::RereadPartitions, disk, partition::settle())?;

    for spec in &layout.partitions {
        require_device(host, Step::RereadPartitions, &layout.device(spec))?;
    }

    Ok(())
}

pub fn build_partitions<H: Host>(host: &mut H, layouts: &[DiskLayout]) -> Result<()> {
    for layout in layouts {
        apply_layout(host, layout)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use storage_types::{EncryptionOptions, FilesystemType, LvmOptions, SizeMib, SwapRequest};

    use super::*;

    fn plan(disks: &[&str], boot_mode: BootMode, strategy: Strategy) -> InstallPlan {
        InstallPlan::new(
            disks.iter().map(PathBuf::from).collect(),
            boot_mode,
            strategy,
        )
    }

    #[test]
    fn fixed_extent_ends_at_last_sized_partition() {
        let mut plan = plan(&["/dev/sda"], BootMode::Legacy, Strategy::Simple);
        plan.swap = SwapRequest::of(SizeMib::new(2048));
        let partitions = plan_partitions(Path::new("/dev/sda"), &plan);
        assert_eq!(fixed_extent_mib(&partitions), Some(1 + 1024 + 2048));

        plan.sizing.boot_mib = u64::MAX;
        let partitions = plan_partitions(Path::new("/dev/sda"), &plan);
        assert_eq!(partitions[1].start_mib, u64::MAX);
        assert_eq!(fixed_extent_mib(&partitions), None);
    }

    fn roles(specs: &[PartitionSpec]) -> Vec<PartitionRole> {
        specs.iter().map(|spec| spec.role).collect()
    }

    #[test]
    fn firmware_simple_layout_starts_at_alignment_offset() {
        let plan = plan(&["/dev/sda"], BootMode::Firmware, Strategy::Simple);
        let specs = plan_partitions(Path::new("/dev/sda"), &plan);

        assert_eq!(
            roles(&specs),
            vec![PartitionRole::Esp, PartitionRole::Boot, PartitionRole::Data]
        );
        assert_eq!(specs[0].start_mib, 1);
        assert_eq!(specs[0].end_mib(), Some(101));
        assert_eq!(specs[1].start_mib, 101);
        assert_eq!(specs[1].end_mib(), Some(1125));
        assert_eq!(specs[2].size, PartitionSize::Remaining);
        assert_eq!(specs[2].fs_hint.as_deref(), Some("ext4"));
    }

    #[test]
    fn legacy_layout_has_single_boot_partition_and_swap() {
        let mut plan = plan(&["/dev/vda"], BootMode::Legacy, Strategy::Simple);
        plan.swap = SwapRequest::of(SizeMib::new(2048));
        let specs = plan_partitions(Path::new("/dev/vda"), &plan);

        assert_eq!(
            roles(&specs),
            vec![PartitionRole::Boot, PartitionRole::Swap, PartitionRole::Data]
        );
        assert_eq!(specs[0].flags, vec!["boot".to_string()]);
        // msdos tables carry swap through the partition type, not a flag
        assert!(specs[1].flags.is_empty());
        assert_eq!(specs[1].start_mib, 1025);
        assert_eq!(specs[2].start_mib, 3073);
    }

    #[test]
    fn encrypted_layout_with_home_splits_data() {
        let mut plan = plan(
            &["/dev/nvme0n1"],
            BootMode::Firmware,
            Strategy::SimpleLuks(EncryptionOptions::with_passphrase("pw")),
        );
        plan.home.enabled = true;
        plan.home.filesystem = Some(FilesystemType::Xfs);
        let specs = plan_partitions(Path::new("/dev/nvme0n1"), &plan);

        let members: Vec<_> = specs
            .iter()
            .filter(|spec| spec.role == PartitionRole::LuksMember)
            .collect();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].size, PartitionSize::Mib(51_200));
        assert_eq!(members[1].size, PartitionSize::Remaining);
        assert!(members.iter().all(|spec| spec.kind == PartitionType::Luks));
    }

    #[test]
    fn raid_lvm_layout_has_no_swap_partition() {
        let mut plan = plan(
            &["/dev/sda", "/dev/sdb"],
            BootMode::Firmware,
            Strategy::RaidLvm(LvmOptions::default()),
        );
        plan.swap = SwapRequest::of(SizeMib::new(4096));
        let layouts = plan_layouts(&plan).unwrap();

        assert_eq!(layouts.len(), 2);
        assert_eq!(
            roles(&layouts[1].partitions),
            vec![
                PartitionRole::Esp,
                PartitionRole::Boot,
                PartitionRole::RaidMember
            ]
        );
        assert_eq!(layouts[1].partitions[1].kind, PartitionType::Raid);
        assert_eq!(
            layouts[1].device(&layouts[1].partitions[2]),
            PathBuf::from("/dev/sdb3")
        );
    }
}
