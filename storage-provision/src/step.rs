// SPDX-License-Identifier: GPL-3.0-only

//! Issuing host actions on behalf of a named step

use std::path::Path;

use storage_sys::{CommandOutcome, Host, ToolCommand};
use tracing::info;

use crate::error::{ProvisionError, Result, Step};

pub(crate) fn run_step<H: Host>(
    host: &mut H,
    step: Step,
    device: &Path,
    command: ToolCommand,
) -> Result<CommandOutcome> {
    info!("{step}: {}", command.render());
    host.run(&command).map_err(|source| ProvisionError::Step {
        step,
        device: device.to_path_buf(),
        source,
    })
}

/// Fail when a device the previous command should have produced is absent
pub(crate) fn require_device<H: Host>(host: &H, step: Step, path: &Path) -> Result<()> {
    if host.path_exists(path) {
        Ok(())
    } else {
        Err(ProvisionError::MissingDevice {
            step,
            path: path.to_path_buf(),
        })
    }
}

pub(crate) fn create_dir<H: Host>(host: &mut H, step: Step, path: &Path) -> Result<()> {
    host.create_dir_all(path)
        .map_err(|source| ProvisionError::Step {
            step,
            device: path.to_path_buf(),
            source,
        })
}
