// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem, swap, mount and identifier commands

use std::path::Path;

use storage_types::FilesystemType;

use crate::cmd::ToolCommand;
use crate::error::{Result, SysError};

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Formatter program for a filesystem type
pub fn mkfs_program(filesystem: FilesystemType) -> &'static str {
    match filesystem {
        FilesystemType::Ext4 => "mkfs.ext4",
        FilesystemType::Xfs => "mkfs.xfs",
        FilesystemType::Btrfs => "mkfs.btrfs",
        FilesystemType::Vfat => "mkfs.fat",
    }
}

/// Create a filesystem, overwriting any existing signature
pub fn mkfs(device: &Path, filesystem: FilesystemType) -> ToolCommand {
    let command = ToolCommand::new(mkfs_program(filesystem));
    let command = match filesystem {
        FilesystemType::Ext4 => command.arg("-F"),
        FilesystemType::Xfs | FilesystemType::Btrfs => command.arg("-f"),
        FilesystemType::Vfat => command.args(["-F", "32"]),
    };
    command.arg(path_arg(device))
}

pub fn mkswap(device: &Path) -> ToolCommand {
    ToolCommand::new("mkswap").arg(path_arg(device))
}

pub fn swapon(device: &Path) -> ToolCommand {
    ToolCommand::new("swapon").arg(path_arg(device))
}

pub fn swapoff(device: &Path) -> ToolCommand {
    ToolCommand::new("swapoff").arg(path_arg(device))
}

pub fn mount(device: &Path, target: &Path, options: Option<&str>) -> ToolCommand {
    let command = ToolCommand::new("mount");
    let command = match options {
        Some(options) => command.args(["-o", options]),
        None => command,
    };
    command.arg(path_arg(device)).arg(path_arg(target))
}

pub fn umount(target: &Path) -> ToolCommand {
    ToolCommand::new("umount").arg(path_arg(target))
}

/// Query the UUID of a device
pub fn blkid_uuid(device: &Path) -> ToolCommand {
    ToolCommand::new("blkid")
        .args(["-s", "UUID", "-o", "value"])
        .arg(path_arg(device))
}

/// Extract the value printed by `blkid -s UUID -o value`
pub fn parse_blkid_value(command: &str, output: &str) -> Result<String> {
    let value = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| SysError::Parse {
            command: command.to_string(),
            reason: "no UUID reported".to_string(),
        })?;

    if value.contains(char::is_whitespace) || value.contains('=') {
        return Err(SysError::Parse {
            command: command.to_string(),
            reason: format!("not a bare UUID: {value}"),
        });
    }

    Ok(value.to_string())
}
