// SPDX-License-Identifier: GPL-3.0-only

//! Device identity registry
//!
//! Holds one write-once [`DeviceIdentityRecord`] per role for the duration of a run.
//! Records are captured by reading back the UUID of each formatted device; the full
//! set is handed out only after the run completes.

use std::path::{Path, PathBuf};

use storage_sys::{Host, filesystem};
use storage_types::{BootMode, DeviceIdentityRecord, FormattedVolume, IdentityRole};
use thiserror::Error;
use tracing::{debug, info};

use crate::compositor::DeviceStack;
use crate::error::{ProvisionError, Result, Step};
use crate::step::run_step;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("identity for role {0} was already captured")]
    DuplicateRole(IdentityRole),

    #[error("device {0:?} already has an identity record")]
    DuplicateDevice(PathBuf),
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    records: Vec<DeviceIdentityRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record; roles and device paths are each recorded at most once
    pub fn insert(&mut self, record: DeviceIdentityRecord) -> std::result::Result<(), RegistryError> {
        if self.get(record.role).is_some() {
            return Err(RegistryError::DuplicateRole(record.role));
        }
        if self.records.iter().any(|known| known.device == record.device) {
            return Err(RegistryError::DuplicateDevice(record.device));
        }

        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, role: IdentityRole) -> Option<&DeviceIdentityRecord> {
        self.records.iter().find(|record| record.role == role)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand out the records, ordered by role
    pub fn into_records(mut self) -> Vec<DeviceIdentityRecord> {
        self.records.sort_by_key(|record| record.role);
        self.records
    }
}

fn read_uuid<H: Host>(host: &mut H, device: &Path) -> Result<String> {
    let command = filesystem::blkid_uuid(device);
    let rendered = command.render();
    let outcome = run_step(host, Step::CaptureIdentity, device, command)?;

    filesystem::parse_blkid_value(&rendered, &outcome.stdout).map_err(|source| {
        ProvisionError::Step {
            step: Step::CaptureIdentity,
            device: device.to_path_buf(),
            source,
        }
    })
}

/// Read back the identity of one volume and store it under `role`
pub fn capture<H: Host>(
    host: &mut H,
    registry: &mut DeviceRegistry,
    role: IdentityRole,
    volume: &FormattedVolume,
    stack: &DeviceStack,
) -> Result<()> {
    let device = volume.device();
    let uuid = read_uuid(host, device)?;

    let container_uuid = match stack.encryption_backing(device) {
        Some(backing) => Some(read_uuid(host, &backing)?),
        None => None,
    };

    info!("captured {role} identity of {}: {uuid}", device.display());
    registry.insert(DeviceIdentityRecord {
        role,
        device: device.to_path_buf(),
        uuid,
        container_uuid,
    })?;
    Ok(())
}

/// Capture every volume that has an identity role in `boot_mode`
pub fn capture_all<H: Host>(
    host: &mut H,
    boot_mode: BootMode,
    volumes: &[FormattedVolume],
    stack: &DeviceStack,
) -> Result<Vec<DeviceIdentityRecord>> {
    let mut registry = DeviceRegistry::new();

    for volume in volumes {
        match IdentityRole::for_volume(volume.role, boot_mode) {
            Some(role) => capture(host, &mut registry, role, volume, stack)?,
            None => debug!("no identity record for {} volume", volume.role),
        }
    }

    Ok(registry.into_records())
}

/// Serialise records for the boot configuration generator
pub fn export_json(records: &[DeviceIdentityRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}
