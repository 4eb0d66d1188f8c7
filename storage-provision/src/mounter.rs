// SPDX-License-Identifier: GPL-3.0-only

//! Mount sequencer
//!
//! Root goes first, then the boot location, then the ESP nested below it, and home
//! last. Each mount point directory is created right before its mount.

use std::path::{Path, PathBuf};

use storage_sys::{Host, filesystem};
use storage_types::{FormattedVolume, InstallPlan, MountEntry, VolumeRole};
use tracing::info;

use crate::error::{Result, Step};
use crate::formatter::FormattedStack;
use crate::paths::under_target;
use crate::step::{create_dir, run_step};

struct Sequence<'a> {
    target_root: &'a Path,
    entries: Vec<MountEntry>,
}

impl Sequence<'_> {
    fn push(&mut self, volume: &FormattedVolume, at: &str, subvolume: Option<&str>) {
        self.entries.push(MountEntry {
            source: volume.device().to_path_buf(),
            target: under_target(self.target_root, at),
            rank: self.entries.len() as u32,
            role: volume.role,
            options: subvolume.map(|name| format!("subvol={name}")),
        });
    }
}

/// Ordered mounts for a set of formatted volumes
pub fn mount_sequence(target_root: &Path, volumes: &[FormattedVolume]) -> Vec<MountEntry> {
    let find = |role: VolumeRole| volumes.iter().find(|volume| volume.role == role);
    let mut sequence = Sequence {
        target_root,
        entries: Vec::new(),
    };

    let root = find(VolumeRole::Root);
    if let Some(root) = root {
        if root.has_subvolume("@") {
            sequence.push(root, "/", Some("@"));
            for (name, at) in [("@var", "/var"), ("@tmp", "/tmp")] {
                if root.has_subvolume(name) {
                    sequence.push(root, at, Some(name));
                }
            }
        } else {
            sequence.push(root, "/", None);
        }
    }

    if let Some(boot) = find(VolumeRole::Boot) {
        sequence.push(boot, "/boot", None);
    }
    if let Some(esp) = find(VolumeRole::Esp) {
        sequence.push(esp, "/boot/efi", None);
    }

    match (find(VolumeRole::Home), root) {
        (Some(home), _) => {
            let subvolume = home.has_subvolume("@home").then_some("@home");
            sequence.push(home, "/home", subvolume);
        }
        (None, Some(root)) if root.has_subvolume("@home") => {
            sequence.push(root, "/home", Some("@home"));
        }
        _ => {}
    }

    sequence.entries
}

/// Mount every volume in order, then activate swap
pub fn mount_all<H: Host>(
    host: &mut H,
    plan: &InstallPlan,
    formatted: &mut FormattedStack,
) -> Result<Vec<MountEntry>> {
    let entries = mount_sequence(&plan.target_root, &formatted.volumes);

    for entry in &entries {
        create_dir(host, Step::Mount, &entry.target)?;
        run_step(
            host,
            Step::Mount,
            &entry.source,
            filesystem::mount(&entry.source, &entry.target, entry.options.as_deref()),
        )?;
        info!("mounted {} at {}", entry.source.display(), entry.target.display());

        if let Some(volume) = formatted
            .volumes
            .iter_mut()
            .find(|volume| volume.role == entry.role && volume.mount_point.is_none())
        {
            volume.mount_point = Some(entry.target.clone());
        }
    }

    if let Some(swap) = formatted.swap.as_deref() {
        run_step(host, Step::ActivateSwap, swap, filesystem::swapon(swap))?;
    }

    Ok(entries)
}

/// Mount targets in the order they were mounted
pub fn targets(entries: &[MountEntry]) -> Vec<PathBuf> {
    entries.iter().map(|entry| entry.target.clone()).collect()
}
