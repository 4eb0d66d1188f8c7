// SPDX-License-Identifier: GPL-3.0-only

//! Device path resolution

use std::path::{Path, PathBuf};

/// Array assembled from the boot partitions
pub const BOOT_ARRAY: u32 = 0;
/// Array assembled from the data partitions
pub const DATA_ARRAY: u32 = 1;

/// Path of partition `index` on `disk`.
///
/// Disks whose name ends in a digit (`nvme0n1`, `mmcblk0`, `loop0`, `md0`) separate the
/// partition number with `p`; persistent `/dev/disk/by-*` links use `-part`.
pub fn partition_path(disk: &Path, index: u32) -> PathBuf {
    let name = disk.to_string_lossy();

    if disk.starts_with("/dev/disk") {
        return PathBuf::from(format!("{name}-part{index}"));
    }

    if name.ends_with(|c: char| c.is_ascii_digit()) {
        PathBuf::from(format!("{name}p{index}"))
    } else {
        PathBuf::from(format!("{name}{index}"))
    }
}

pub fn array_path(number: u32) -> PathBuf {
    PathBuf::from(format!("/dev/md{number}"))
}

pub fn mapper_path(name: &str) -> PathBuf {
    Path::new("/dev/mapper").join(name)
}

pub fn volume_group_path(volume_group: &str) -> PathBuf {
    Path::new("/dev").join(volume_group)
}

pub fn logical_volume_path(volume_group: &str, name: &str) -> PathBuf {
    volume_group_path(volume_group).join(name)
}

/// `absolute` re-rooted under the target root (`/boot` → `/mnt/boot`)
pub fn under_target(target_root: &Path, absolute: &str) -> PathBuf {
    let relative = absolute.trim_start_matches('/');
    if relative.is_empty() {
        target_root.to_path_buf()
    } else {
        target_root.join(relative)
    }
}
