//! Install plan types
//!
//! An [`InstallPlan`] is the immutable configuration of one provisioning run. It is
//! built once by the config layer and passed by reference through every step.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{DEFAULT_ALIGNMENT_MIB, SizeMib};
use crate::strategy::Strategy;

/// How the host firmware starts the installed system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    /// MBR boot code, `msdos` partition table, single boot partition
    Legacy,
    /// EFI system partition plus an extended boot loader partition on GPT
    Firmware,
}

impl BootMode {
    pub fn partition_table(self) -> PartitionTable {
        match self {
            BootMode::Legacy => PartitionTable::Msdos,
            BootMode::Firmware => PartitionTable::Gpt,
        }
    }

    /// Filesystem for the boot location: firmware loaders read FAT, boot code reads ext4
    pub fn boot_filesystem(self) -> FilesystemType {
        match self {
            BootMode::Legacy => FilesystemType::Ext4,
            BootMode::Firmware => FilesystemType::Vfat,
        }
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Legacy => f.write_str("legacy"),
            BootMode::Firmware => f.write_str("firmware"),
        }
    }
}

/// Partition table label written by `parted mklabel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionTable {
    Gpt,
    Msdos,
}

impl PartitionTable {
    pub fn label(self) -> &'static str {
        match self {
            PartitionTable::Gpt => "gpt",
            PartitionTable::Msdos => "msdos",
        }
    }
}

/// Filesystem types the formatter knows how to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemType {
    Ext4,
    Xfs,
    Btrfs,
    Vfat,
}

impl FilesystemType {
    pub fn name(self) -> &'static str {
        match self {
            FilesystemType::Ext4 => "ext4",
            FilesystemType::Xfs => "xfs",
            FilesystemType::Btrfs => "btrfs",
            FilesystemType::Vfat => "vfat",
        }
    }

    /// Whether the filesystem carries named subvolumes
    pub fn supports_subvolumes(self) -> bool {
        matches!(self, FilesystemType::Btrfs)
    }

    /// Type hint handed to `parted mkpart`
    pub fn parted_hint(self) -> &'static str {
        match self {
            FilesystemType::Vfat => "fat32",
            other => other.name(),
        }
    }
}

impl fmt::Display for FilesystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilesystemType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ext4" => Ok(FilesystemType::Ext4),
            "xfs" => Ok(FilesystemType::Xfs),
            "btrfs" => Ok(FilesystemType::Btrfs),
            "vfat" | "fat32" => Ok(FilesystemType::Vfat),
            other => Err(format!("unsupported filesystem: {other}")),
        }
    }
}

/// Swap request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub enabled: bool,
    #[serde(default = "default_swap_size")]
    pub size: SizeMib,
}

impl Default for SwapRequest {
    fn default() -> Self {
        Self {
            enabled: false,
            size: default_swap_size(),
        }
    }
}

impl SwapRequest {
    pub fn of(size: SizeMib) -> Self {
        Self {
            enabled: true,
            size,
        }
    }

    /// Size of the swap area when enabled
    pub fn requested(&self) -> Option<SizeMib> {
        self.enabled.then_some(self.size)
    }
}

fn default_swap_size() -> SizeMib {
    SizeMib::gib(2)
}

/// Separate home volume request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HomeRequest {
    pub enabled: bool,
    /// Filesystem for the home volume; the root filesystem when unset
    #[serde(default)]
    pub filesystem: Option<FilesystemType>,
}

/// Fixed partition sizes and alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sizing {
    /// Offset of the first partition
    pub alignment_mib: u64,
    /// EFI system partition (firmware mode)
    pub esp_mib: u64,
    /// Boot partition (extended boot loader in firmware mode)
    pub boot_mib: u64,
    /// Root partition when a separate home partition takes the rest of the disk
    pub root_mib: u64,
}

impl Default for Sizing {
    fn default() -> Self {
        Self {
            alignment_mib: DEFAULT_ALIGNMENT_MIB,
            esp_mib: 100,
            boot_mib: 1024,
            root_mib: 51_200,
        }
    }
}

/// Immutable configuration of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPlan {
    /// Target disks, in order; the first disk hosts the EFI system partition
    pub disks: Vec<PathBuf>,
    pub boot_mode: BootMode,
    pub strategy: Strategy,
    pub root_filesystem: FilesystemType,
    pub swap: SwapRequest,
    pub home: HomeRequest,
    pub sizing: Sizing,
    /// Mount point of the new system's root
    pub target_root: PathBuf,
}

impl InstallPlan {
    pub fn new(disks: Vec<PathBuf>, boot_mode: BootMode, strategy: Strategy) -> Self {
        Self {
            disks,
            boot_mode,
            strategy,
            root_filesystem: FilesystemType::Ext4,
            swap: SwapRequest::default(),
            home: HomeRequest::default(),
            sizing: Sizing::default(),
            target_root: PathBuf::from("/mnt"),
        }
    }

    /// Filesystem of the separate home volume, if one was requested
    pub fn home_filesystem(&self) -> Option<FilesystemType> {
        self.home
            .enabled
            .then(|| self.home.filesystem.unwrap_or(self.root_filesystem))
    }

    pub fn partition_table(&self) -> PartitionTable {
        self.boot_mode.partition_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_filesystem_defaults_to_root() {
        let mut plan = InstallPlan::new(
            vec![PathBuf::from("/dev/sda")],
            BootMode::Firmware,
            Strategy::Simple,
        );
        assert_eq!(plan.home_filesystem(), None);

        plan.home.enabled = true;
        plan.root_filesystem = FilesystemType::Btrfs;
        assert_eq!(plan.home_filesystem(), Some(FilesystemType::Btrfs));

        plan.home.filesystem = Some(FilesystemType::Xfs);
        assert_eq!(plan.home_filesystem(), Some(FilesystemType::Xfs));
    }

    #[test]
    fn boot_mode_selects_table_and_boot_filesystem() {
        assert_eq!(BootMode::Legacy.partition_table(), PartitionTable::Msdos);
        assert_eq!(BootMode::Firmware.partition_table(), PartitionTable::Gpt);
        assert_eq!(BootMode::Firmware.boot_filesystem(), FilesystemType::Vfat);
    }
}
