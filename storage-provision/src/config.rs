// SPDX-License-Identifier: GPL-3.0-only

//! Plan files
//!
//! A plan file is TOML that resolves into an immutable [`InstallPlan`]. Resolution
//! settles `boot_mode = "auto"` and applies the passphrase override from the
//! environment; nothing reads configuration after that.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storage_types::{
    BootMode, FilesystemType, HomeRequest, InstallPlan, Passphrase, Sizing, Strategy, SwapRequest,
};
use thiserror::Error;
use tracing::debug;

/// Environment variable that overrides `strategy.passphrase`
pub const PASSPHRASE_ENV: &str = "STORAGE_PROVISION_PASSPHRASE";

const FIRMWARE_MARKER: &str = "/sys/firmware/efi";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read plan file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plan file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootModeSetting {
    /// Firmware when the running system was booted through firmware, else legacy
    #[default]
    Auto,
    Legacy,
    Firmware,
}

impl BootModeSetting {
    pub fn resolve(self, firmware_present: bool) -> BootMode {
        match self {
            BootModeSetting::Legacy => BootMode::Legacy,
            BootModeSetting::Firmware => BootMode::Firmware,
            BootModeSetting::Auto if firmware_present => BootMode::Firmware,
            BootModeSetting::Auto => BootMode::Legacy,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    pub disks: Vec<PathBuf>,
    #[serde(default)]
    pub boot_mode: BootModeSetting,
    #[serde(default = "default_root_filesystem")]
    pub root_filesystem: FilesystemType,
    #[serde(default = "default_target_root")]
    pub target_root: PathBuf,
    pub strategy: Strategy,
    #[serde(default)]
    pub swap: SwapRequest,
    #[serde(default)]
    pub home: HomeRequest,
    #[serde(default)]
    pub sizing: Sizing,
}

fn default_root_filesystem() -> FilesystemType {
    FilesystemType::Ext4
}

fn default_target_root() -> PathBuf {
    PathBuf::from("/mnt")
}

impl PlanFile {
    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    pub fn resolve(self, firmware_present: bool, passphrase: Option<String>) -> InstallPlan {
        let mut strategy = self.strategy;
        if let Some(value) = passphrase
            && let Some(encryption) = strategy.encryption_mut()
        {
            debug!("using passphrase from {PASSPHRASE_ENV}");
            encryption.passphrase = Passphrase::new(value);
        }

        InstallPlan {
            disks: self.disks,
            boot_mode: self.boot_mode.resolve(firmware_present),
            strategy,
            root_filesystem: self.root_filesystem,
            swap: self.swap,
            home: self.home,
            sizing: self.sizing,
            target_root: self.target_root,
        }
    }
}

/// Whether the running system was started through firmware boot services
pub fn detect_firmware() -> bool {
    Path::new(FIRMWARE_MARKER).exists()
}

/// Load and resolve a plan file against the running system and environment
pub fn load_plan(path: &Path) -> Result<InstallPlan, ConfigError> {
    let file = PlanFile::load(path)?;
    let passphrase = std::env::var(PASSPHRASE_ENV)
        .ok()
        .filter(|value| !value.is_empty());
    Ok(file.resolve(detect_firmware(), passphrase))
}
