// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::path::PathBuf;

use storage_sys::SysError;
use storage_types::DiskRequirement;
use thiserror::Error;

use crate::registry::RegistryError;

/// Problems with a plan, reported before anything touches a disk
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no target disks given")]
    NoDisks,

    #[error("disk listed more than once: {0:?}")]
    DuplicateDisk(PathBuf),

    #[error("disk path must be absolute: {0:?}")]
    RelativeDisk(PathBuf),

    #[error("strategy '{strategy}' needs {required} disk(s), got {actual}")]
    DiskCount {
        strategy: &'static str,
        required: DiskRequirement,
        actual: usize,
    },

    #[error("swap is enabled with a zero size")]
    ZeroSwap,

    #[error("strategy '{0}' needs an encryption passphrase")]
    MissingPassphrase(&'static str),

    #[error("invalid encryption mapper name: {0:?}")]
    MapperName(String),

    #[error("root and home containers share the mapper name {0:?}")]
    DuplicateMapper(String),

    #[error("root_percent_free must be between 1 and 99, got {0}")]
    RootPercent(u8),

    #[error("volume group name is empty")]
    EmptyVolumeGroup,

    #[error("invalid sizing: {0}")]
    Sizing(String),

    #[error("target root must be an absolute path: {0:?}")]
    RelativeTarget(PathBuf),

    #[error("target disk does not exist: {0:?}")]
    MissingDisk(PathBuf),

    #[error("required tool not installed: {0}")]
    MissingTool(String),

    #[error("partition layout of {other:?} differs from {first:?}")]
    AsymmetricLayout { first: PathBuf, other: PathBuf },
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    #[error("strategy '{strategy}' is not implemented")]
    NotImplemented { strategy: &'static str },

    #[error("{step} failed on {device:?}: {source}")]
    Step {
        step: Step,
        device: PathBuf,
        #[source]
        source: SysError,
    },

    #[error("{step}: expected device {path:?} does not exist")]
    MissingDevice { step: Step, path: PathBuf },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ProvisionError {
    /// Raised before any destructive command was issued
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ProvisionError::Plan(_) | ProvisionError::NotImplemented { .. }
        )
    }
}

/// A step of the provisioning sequence, named in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    WipeDisk,
    WritePartitionTable,
    CreatePartition,
    RereadPartitions,
    AssembleArray,
    FormatContainer,
    OpenContainer,
    CreatePhysicalVolume,
    CreateVolumeGroup,
    CreateLogicalVolume,
    Format,
    CreateSubvolume,
    Mount,
    ActivateSwap,
    WriteArrayDescriptor,
    CaptureIdentity,
    Teardown,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::WipeDisk => "wipe disk",
            Step::WritePartitionTable => "write partition table",
            Step::CreatePartition => "create partition",
            Step::RereadPartitions => "re-read partition table",
            Step::AssembleArray => "assemble array",
            Step::FormatContainer => "format encryption container",
            Step::OpenContainer => "open encryption container",
            Step::CreatePhysicalVolume => "create physical volume",
            Step::CreateVolumeGroup => "create volume group",
            Step::CreateLogicalVolume => "create logical volume",
            Step::Format => "format",
            Step::CreateSubvolume => "create subvolume",
            Step::Mount => "mount",
            Step::ActivateSwap => "activate swap",
            Step::WriteArrayDescriptor => "write array descriptor",
            Step::CaptureIdentity => "capture identity",
            Step::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
