// SPDX-License-Identifier: GPL-3.0-only

//! Encryption container commands (`cryptsetup`)
//!
//! Key material is always passed through stdin (`--key-file -`), never as an argument.

use std::path::Path;

use storage_types::Passphrase;

use crate::cmd::ToolCommand;

pub fn format(device: &Path, passphrase: &Passphrase) -> ToolCommand {
    ToolCommand::new("cryptsetup")
        .args(["luksFormat", "--type", "luks2", "--batch-mode", "--key-file", "-"])
        .arg(device.display().to_string())
        .stdin(passphrase.clone())
}

pub fn open(device: &Path, mapper: &str, passphrase: &Passphrase) -> ToolCommand {
    ToolCommand::new("cryptsetup")
        .args(["open", "--key-file", "-"])
        .arg(device.display().to_string())
        .arg(mapper)
        .stdin(passphrase.clone())
}

pub fn close(mapper: &str) -> ToolCommand {
    ToolCommand::new("cryptsetup").args(["close", mapper])
}
