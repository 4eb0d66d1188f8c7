// SPDX-License-Identifier: GPL-3.0-only

//! Partition table commands (`wipefs`, `parted`, `partprobe`, `udevadm`)

use std::path::Path;

use storage_types::{PartitionSpec, PartitionTable};

use crate::cmd::ToolCommand;

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Erase every filesystem, RAID and partition-table signature on a disk
pub fn wipe_signatures(disk: &Path) -> ToolCommand {
    ToolCommand::new("wipefs").args(["--all", "--force"]).arg(path_arg(disk))
}

pub fn make_label(disk: &Path, table: PartitionTable) -> ToolCommand {
    ToolCommand::new("parted")
        .args(["--script", path_arg(disk).as_str(), "mklabel", table.label()])
}

/// `parted mkpart` for one planned partition.
///
/// GPT partitions carry their name; msdos partitions are always primary.
pub fn make_partition(spec: &PartitionSpec, table: PartitionTable) -> ToolCommand {
    let name = match table {
        PartitionTable::Gpt => spec.name.clone(),
        PartitionTable::Msdos => "primary".to_string(),
    };
    let end = match spec.end_mib() {
        Some(end) => format!("{end}MiB"),
        None => "100%".to_string(),
    };

    let mut command = ToolCommand::new("parted")
        .args(["--script", "--align", "optimal", path_arg(&spec.disk).as_str(), "mkpart"])
        .arg(name);
    if let Some(hint) = &spec.fs_hint {
        command = command.arg(hint.clone());
    }
    command.arg(format!("{}MiB", spec.start_mib)).arg(end)
}

pub fn set_flag(disk: &Path, index: u32, flag: &str) -> ToolCommand {
    ToolCommand::new("parted").args([
        "--script".to_string(),
        path_arg(disk),
        "set".to_string(),
        index.to_string(),
        flag.to_string(),
        "on".to_string(),
    ])
}

/// Ask the kernel to re-read the partition table
pub fn reread(disk: &Path) -> ToolCommand {
    ToolCommand::new("partprobe").arg(path_arg(disk))
}

/// Wait for udev to finish creating device nodes
pub fn settle() -> ToolCommand {
    ToolCommand::new("udevadm").arg("settle")
}
