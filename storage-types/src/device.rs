//! Partition and block device graph types

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What a partition slot is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionRole {
    /// EFI system partition
    Esp,
    /// Boot location (extended boot loader partition in firmware mode)
    Boot,
    Swap,
    /// Member of the data array
    RaidMember,
    /// Backing device of an encryption container
    LuksMember,
    /// Plain filesystem
    Data,
}

/// Partition type label, mapped onto `parted` flags by the partition builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionType {
    EfiSystem,
    ExtendedBoot,
    LegacyBoot,
    Swap,
    Raid,
    Luks,
    Linux,
}

impl PartitionType {
    pub fn label(self) -> &'static str {
        match self {
            PartitionType::EfiSystem => "esp",
            PartitionType::ExtendedBoot => "xbootldr",
            PartitionType::LegacyBoot => "boot",
            PartitionType::Swap => "swap",
            PartitionType::Raid => "raid",
            PartitionType::Luks => "luks",
            PartitionType::Linux => "linux",
        }
    }
}

/// Size of a planned partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionSize {
    Mib(u64),
    /// Everything up to the end of the disk
    Remaining,
}

impl fmt::Display for PartitionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionSize::Mib(mib) => write!(f, "{mib}MiB"),
            PartitionSize::Remaining => f.write_str("remaining"),
        }
    }
}

/// One planned partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Whole-disk device the partition lives on
    pub disk: PathBuf,
    /// 1-based partition number
    pub index: u32,
    /// Start offset in MiB
    pub start_mib: u64,
    pub size: PartitionSize,
    pub kind: PartitionType,
    pub role: PartitionRole,
    /// GPT partition name (ignored on msdos tables)
    pub name: String,
    /// Filesystem hint for `parted mkpart`
    pub fs_hint: Option<String>,
    /// `parted set <n> <flag> on` flags
    pub flags: Vec<String>,
}

impl PartitionSpec {
    /// End offset in MiB, `None` when the partition runs to the end of the disk
    pub fn end_mib(&self) -> Option<u64> {
        match self.size {
            PartitionSize::Mib(mib) => Some(self.start_mib.saturating_add(mib)),
            PartitionSize::Remaining => None,
        }
    }

    /// Same slot on another disk: everything but the disk matches
    pub fn same_shape(&self, other: &PartitionSpec) -> bool {
        self.index == other.index
            && self.start_mib == other.start_mib
            && self.size == other.size
            && self.kind == other.kind
            && self.role == other.role
            && self.flags == other.flags
    }
}

/// The role a composed device plays in the installed system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeRole {
    Root,
    Boot,
    Esp,
    Swap,
    Home,
}

impl fmt::Display for VolumeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VolumeRole::Root => "root",
            VolumeRole::Boot => "boot",
            VolumeRole::Esp => "esp",
            VolumeRole::Swap => "swap",
            VolumeRole::Home => "home",
        };
        f.write_str(name)
    }
}

/// Redundancy of an assembled array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidLevel {
    /// RAID1
    Mirror,
    /// RAID5
    Parity,
}

impl RaidLevel {
    /// Data arrays mirror across two disks and use parity from three upwards
    pub fn for_disk_count(count: usize) -> Self {
        if count >= 3 {
            RaidLevel::Parity
        } else {
            RaidLevel::Mirror
        }
    }

    /// Value for `mdadm --level`
    pub fn mdadm_level(self) -> &'static str {
        match self {
            RaidLevel::Mirror => "1",
            RaidLevel::Parity => "5",
        }
    }
}

/// Layer a node occupies in the device stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    RawPartition,
    RaidArray { level: RaidLevel },
    EncryptedContainer,
    VolumeGroup,
    LogicalVolume,
}

/// A device in the composed stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub path: PathBuf,
    /// Devices this node is built on (array members, container backing device, group)
    pub parents: Vec<PathBuf>,
    /// Set on nodes that end up carrying a filesystem or swap
    pub role: Option<VolumeRole>,
}

impl BlockDeviceNode {
    pub fn partition(path: impl Into<PathBuf>, role: Option<VolumeRole>) -> Self {
        Self {
            kind: NodeKind::RawPartition,
            path: path.into(),
            parents: Vec::new(),
            role,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.kind, NodeKind::EncryptedContainer)
    }
}
