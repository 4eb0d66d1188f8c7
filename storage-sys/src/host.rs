// SPDX-License-Identifier: GPL-3.0-only

//! The machine the provisioning run acts on
//!
//! [`Host`] is the single seam between orchestration and side effects. [`SystemHost`]
//! executes against the running system; [`RecordingHost`] records what would happen and
//! answers identifier queries with synthesised values.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cmd::{self, CommandOutcome, ToolCommand};
use crate::error::{Result, SysError};

pub trait Host {
    /// Run an external tool; a non-zero exit is an error
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutcome>;

    fn create_dir_all(&mut self, path: &Path) -> Result<()>;

    fn append_file(&mut self, path: &Path, contents: &str) -> Result<()>;

    fn path_exists(&self, path: &Path) -> bool;

    fn tool_available(&self, program: &str) -> bool;

    /// Contents of `/proc/self/mountinfo`
    fn read_mountinfo(&self) -> Result<String>;
}

/// Acts on the running system
#[derive(Debug, Default)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

impl Host for SystemHost {
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutcome> {
        cmd::run(command)
    }

    fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|source| SysError::PathIo {
            path: path.to_path_buf(),
            source,
        })
    }

    fn append_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SysError::PathIo {
                path: path.to_path_buf(),
                source,
            })?;
        file.write_all(contents.as_bytes())
            .map_err(|source| SysError::PathIo {
                path: path.to_path_buf(),
                source,
            })
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn tool_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn read_mountinfo(&self) -> Result<String> {
        let path = Path::new("/proc/self/mountinfo");
        fs::read_to_string(path).map_err(|source| SysError::PathIo {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One side effect seen by a [`RecordingHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    Run(String),
    CreateDir(PathBuf),
    AppendFile { path: PathBuf, contents: String },
}

impl fmt::Display for HostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostAction::Run(command) => write!(f, "{command}"),
            HostAction::CreateDir(path) => write!(f, "mkdir -p {}", path.display()),
            HostAction::AppendFile { path, contents } => {
                write!(f, "append {} ({} bytes)", path.display(), contents.len())
            }
        }
    }
}

#[derive(Debug, Clone)]
struct FailureRule {
    program: String,
    fragment: String,
}

/// Records actions instead of performing them.
///
/// Every path and tool is assumed present unless marked missing. `blkid` answers with
/// deterministic UUIDs and `mdadm --detail --scan` lists the arrays created so far.
#[derive(Debug, Default)]
pub struct RecordingHost {
    actions: Vec<HostAction>,
    missing_paths: BTreeSet<PathBuf>,
    missing_tools: BTreeSet<String>,
    failures: Vec<FailureRule>,
    mountinfo: String,
    issued_uuids: u128,
    arrays: Vec<String>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing_paths.insert(path.into());
        self
    }

    pub fn with_missing_tool(mut self, program: impl Into<String>) -> Self {
        self.missing_tools.insert(program.into());
        self
    }

    /// Fail any `program` invocation whose rendered form contains `fragment`
    pub fn with_failure(mut self, program: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.failures.push(FailureRule {
            program: program.into(),
            fragment: fragment.into(),
        });
        self
    }

    pub fn with_mountinfo(mut self, mountinfo: impl Into<String>) -> Self {
        self.mountinfo = mountinfo.into();
        self
    }

    pub fn actions(&self) -> &[HostAction] {
        &self.actions
    }

    /// Rendered commands, in issue order
    pub fn commands(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                HostAction::Run(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    fn next_uuid(&mut self) -> String {
        self.issued_uuids += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.issued_uuids)
    }

    fn scan_output(&self) -> String {
        self.arrays
            .iter()
            .enumerate()
            .map(|(index, device)| {
                format!(
                    "ARRAY {device} metadata=1.2 name=provision:{index} UUID=0000000{index}:00000000:00000000:00000000\n"
                )
            })
            .collect()
    }
}

impl Host for RecordingHost {
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutcome> {
        let rendered = command.render();
        debug!("record: {}", rendered);
        self.actions.push(HostAction::Run(rendered.clone()));

        if self
            .failures
            .iter()
            .any(|rule| rule.program == command.program && rendered.contains(&rule.fragment))
        {
            return Err(SysError::CommandFailed {
                command: rendered,
                stderr: "injected failure".to_string(),
            });
        }

        let mut outcome = CommandOutcome::skipped(command);
        match command.program.as_str() {
            "blkid" => outcome.stdout = format!("{}\n", self.next_uuid()),
            "mdadm" if command.has_args(&["--create"]) => {
                if let Some(device) = command.args.get(1) {
                    self.arrays.push(device.clone());
                }
            }
            "mdadm" if command.has_args(&["--detail", "--scan"]) => {
                outcome.stdout = self.scan_output();
            }
            _ => {}
        }

        Ok(outcome)
    }

    fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        self.actions.push(HostAction::CreateDir(path.to_path_buf()));
        Ok(())
    }

    fn append_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        self.actions.push(HostAction::AppendFile {
            path: path.to_path_buf(),
            contents: contents.to_string(),
        });
        Ok(())
    }

    fn path_exists(&self, path: &Path) -> bool {
        !self.missing_paths.contains(path)
    }

    fn tool_available(&self, program: &str) -> bool {
        !self.missing_tools.contains(program)
    }

    fn read_mountinfo(&self) -> Result<String> {
        Ok(self.mountinfo.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_answers_identity_queries() {
        let mut host = RecordingHost::new();
        let uuid = host
            .run(&ToolCommand::new("blkid").args(["-s", "UUID", "-o", "value", "/dev/sda2"]))
            .unwrap();
        assert_eq!(uuid.stdout.trim(), "00000000-0000-4000-8000-000000000001");

        host.run(&ToolCommand::new("mdadm").args(["--create", "/dev/md0", "--run"]))
            .unwrap();
        let scan = host
            .run(&ToolCommand::new("mdadm").args(["--detail", "--scan"]))
            .unwrap();
        assert!(scan.stdout.starts_with("ARRAY /dev/md0 "));
        assert_eq!(host.commands().len(), 3);
    }

    #[test]
    fn injected_failures_are_recorded_then_raised() {
        let mut host = RecordingHost::new().with_failure("mkfs.ext4", "/dev/sda3");
        let result = host.run(&ToolCommand::new("mkfs.ext4").args(["-F", "/dev/sda3"]));
        assert!(matches!(result, Err(SysError::CommandFailed { .. })));
        assert_eq!(host.commands(), vec!["mkfs.ext4 -F /dev/sda3".to_string()]);
    }
}
