// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for storage provisioning
//!
//! This crate defines the types that flow through one provisioning run:
//!
//! - **storage-provision**: builds an [`InstallPlan`] from a plan file and walks it
//!   through partitioning, composition, formatting and mounting
//! - **storage-sys**: renders the typed records here into external tool invocations
//!
//! ## Lifecycle
//!
//! - `InstallPlan` → immutable input for a run
//! - `PartitionSpec` → one planned partition per disk slot
//! - `BlockDeviceNode` → the layered device graph (partition, array, container, volume)
//! - `FormattedVolume` → a node carrying a filesystem
//! - `MountEntry` → where and in which order a volume was mounted
//! - `DeviceIdentityRecord` → the stable identifiers handed to boot configuration

pub mod common;
pub mod device;
pub mod identity;
pub mod plan;
pub mod strategy;
pub mod volume;

pub use common::*;
pub use device::*;
pub use identity::*;
pub use plan::*;
pub use strategy::*;
pub use volume::*;
