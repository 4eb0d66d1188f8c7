// SPDX-License-Identifier: GPL-3.0-only

//! Typed external tool invocations
//!
//! Every action against the machine is a [`ToolCommand`]: a program, its arguments and
//! optional secret input fed through stdin. Rendering never includes the stdin payload.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use storage_types::Passphrase;

use crate::error::{Result, SysError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Fed to the child's stdin (key material for `cryptsetup --key-file -`)
    pub stdin: Option<Passphrase>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, secret: Passphrase) -> Self {
        self.stdin = Some(secret);
        self
    }

    pub fn render(&self) -> String {
        render(&self.program, &self.args)
    }

    /// Whether the first non-flag arguments match `words` (e.g. `["subvolume", "create"]`)
    pub fn has_args(&self, words: &[&str]) -> bool {
        self.args.len() >= words.len()
            && self
                .args
                .iter()
                .zip(words.iter())
                .all(|(arg, word)| arg == word)
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub executed: bool,
}

impl CommandOutcome {
    pub fn skipped(command: &ToolCommand) -> Self {
        Self {
            command: command.render(),
            stdout: String::new(),
            stderr: String::new(),
            executed: false,
        }
    }
}

pub fn render(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

/// Run a command to completion, failing on a non-zero exit status
pub fn run(command: &ToolCommand) -> Result<CommandOutcome> {
    let rendered = command.render();

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| match error.kind() {
            ErrorKind::NotFound => SysError::ToolMissing(command.program.clone()),
            _ => SysError::CommandFailed {
                command: rendered.clone(),
                stderr: error.to_string(),
            },
        })?;

    if let Some(secret) = &command.stdin
        && let Some(mut stdin) = child.stdin.take()
    {
        stdin
            .write_all(secret.expose().as_bytes())
            .map_err(|error| SysError::CommandFailed {
                command: rendered.clone(),
                stderr: error.to_string(),
            })?;
    }

    let output = child
        .wait_with_output()
        .map_err(|error| SysError::CommandFailed {
            command: rendered.clone(),
            stderr: error.to_string(),
        })?;

    if !output.status.success() {
        return Err(SysError::CommandFailed {
            command: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(CommandOutcome {
        command: rendered,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        executed: true,
    })
}
