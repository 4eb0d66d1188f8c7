//! Formatted volumes and mount records

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::device::{BlockDeviceNode, VolumeRole};
use crate::plan::FilesystemType;

/// A device carrying a filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedVolume {
    pub node: BlockDeviceNode,
    pub role: VolumeRole,
    pub filesystem: FilesystemType,
    /// Subvolumes created at the filesystem's top level
    pub subvolumes: Vec<String>,
    /// Recorded by the mount sequencer
    pub mount_point: Option<PathBuf>,
}

impl FormattedVolume {
    pub fn device(&self) -> &std::path::Path {
        &self.node.path
    }

    pub fn has_subvolume(&self, name: &str) -> bool {
        self.subvolumes.iter().any(|subvolume| subvolume == name)
    }
}

/// One mount performed under the target root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountEntry {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Position in the mount sequence, starting at 0 for root
    pub rank: u32,
    pub role: VolumeRole,
    /// Extra `mount -o` options (subvolume selection)
    pub options: Option<String>,
}
