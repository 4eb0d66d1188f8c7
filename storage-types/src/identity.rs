//! Device identity records handed to boot configuration

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::device::VolumeRole;
use crate::plan::BootMode;

/// Role label of an identity record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityRole {
    Root,
    /// Boot location in legacy mode
    Boot,
    /// Extended boot loader location in firmware mode
    #[serde(rename = "XBOOTLDR")]
    XBootLdr,
    Home,
}

impl IdentityRole {
    /// Label for a volume role, `None` for roles boot configuration does not reference
    pub fn for_volume(role: VolumeRole, boot_mode: BootMode) -> Option<Self> {
        match role {
            VolumeRole::Root => Some(IdentityRole::Root),
            VolumeRole::Home => Some(IdentityRole::Home),
            VolumeRole::Boot => Some(match boot_mode {
                BootMode::Legacy => IdentityRole::Boot,
                BootMode::Firmware => IdentityRole::XBootLdr,
            }),
            VolumeRole::Esp | VolumeRole::Swap => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IdentityRole::Root => "ROOT",
            IdentityRole::Boot => "BOOT",
            IdentityRole::XBootLdr => "XBOOTLDR",
            IdentityRole::Home => "HOME",
        }
    }
}

impl fmt::Display for IdentityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stable identifier of a formatted device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentityRecord {
    pub role: IdentityRole,
    pub device: PathBuf,
    /// Filesystem UUID
    pub uuid: String,
    /// UUID of the encryption header the device is opened from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_uuid: Option<String>,
}
