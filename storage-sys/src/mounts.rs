// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, SysError};

/// Mount points at or below `root`, deepest first so they can be unmounted in order
pub fn mounts_under(mount_info: &str, root: &Path) -> Result<Vec<PathBuf>> {
    let mut mounts: Vec<PathBuf> = parse_mount_points(mount_info)?
        .into_iter()
        .filter(|mount| mount.starts_with(root))
        .collect();

    mounts.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| b.cmp(a))
    });
    Ok(mounts)
}

pub fn parse_mount_points(input: &str) -> Result<BTreeSet<PathBuf>> {
    let mut points = BTreeSet::new();

    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let invalid = || SysError::Parse {
            command: "/proc/self/mountinfo".to_string(),
            reason: format!("invalid mountinfo line: {line}"),
        };

        let (left, _right) = line.split_once(" - ").ok_or_else(invalid)?;
        let mount_point = left.split_whitespace().nth(4).ok_or_else(invalid)?;

        points.insert(PathBuf::from(unescape_mount_field(mount_point)));
    }

    Ok(points)
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1].is_ascii_digit()
            && bytes[index + 2].is_ascii_digit()
            && bytes[index + 3].is_ascii_digit()
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(num) = u8::from_str_radix(octal, 8) {
                output.push(num as char);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index] as char);
        index += 1;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "36 25 8:2 / / rw,relatime - ext4 /dev/nvme0n1p2 rw\n\
        90 36 9:1 / /mnt rw,relatime - ext4 /dev/md1 rw\n\
        91 90 9:0 / /mnt/boot rw,relatime - vfat /dev/md0 rw\n\
        92 91 8:1 / /mnt/boot/efi rw,relatime - vfat /dev/sda1 rw\n\
        93 90 253:2 / /mnt/home\\040dir rw,relatime - xfs /dev/mapper/vg0-home rw\n";

    #[test]
    fn lists_mounts_under_target_deepest_first() {
        let mounts = mounts_under(SAMPLE, Path::new("/mnt")).expect("parse should succeed");
        assert_eq!(
            mounts,
            vec![
                PathBuf::from("/mnt/boot/efi"),
                PathBuf::from("/mnt/home dir"),
                PathBuf::from("/mnt/boot"),
                PathBuf::from("/mnt"),
            ]
        );
    }

    #[test]
    fn rejects_truncated_lines() {
        assert!(parse_mount_points("36 25 8:2 /").is_err());
    }
}
