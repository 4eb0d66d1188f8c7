// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for storage provisioning
//!
//! This crate turns provisioning steps into typed external tool invocations:
//! - Partition tables (`wipefs`, `parted`, `partprobe`, `udevadm`)
//! - Arrays, volume groups and subvolumes (`mdadm`, LVM tools, `btrfs`)
//! - Encryption containers (`cryptsetup`)
//! - Filesystems, swap, mounts and identifiers (`mkfs.*`, `mkswap`, `mount`, `blkid`)
//!
//! Commands are executed through a [`Host`], so the same sequence can run against the
//! machine or be recorded for a dry run.
//!
//! These operations require elevated privileges and destroy data on the devices they
//! are pointed at.

pub mod cmd;
pub mod error;
pub mod filesystem;
pub mod host;
pub mod logical;
pub mod luks;
pub mod mounts;
pub mod partition;

pub use cmd::{CommandOutcome, ToolCommand};
pub use error::{Result, SysError};
pub use host::{Host, HostAction, RecordingHost, SystemHost};
