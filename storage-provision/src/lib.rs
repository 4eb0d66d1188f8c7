// SPDX-License-Identifier: GPL-3.0-only

//! Storage provisioning orchestrator
//!
//! Turns an [`InstallPlan`](storage_types::InstallPlan) into partitioned, composed,
//! formatted and mounted disks under a target root, and returns the identities of the
//! resulting volumes for boot configuration.
//!
//! The run is strictly sequential and fails fast. Every side effect goes through a
//! [`Host`](storage_sys::Host), so the same sequence can be recorded instead of executed.

pub mod compositor;
pub mod config;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod mounter;
pub mod partition_table;
pub mod paths;
pub mod registry;
pub mod strategy;
pub mod teardown;

mod step;

pub use compositor::{DeviceStack, compose, write_array_descriptor};
pub use config::{ConfigError, PlanFile, load_plan};
pub use error::{PlanError, ProvisionError, Result, Step};
pub use formatter::{FormattedStack, format, format_stack};
pub use mounter::{mount_all, mount_sequence};
pub use partition_table::{DiskLayout, build_partitions, plan_layouts, plan_partitions};
pub use registry::{DeviceRegistry, RegistryError, capture, capture_all, export_json};
pub use strategy::{ProvisionOutcome, execute_strategy, preflight, validate_plan};
pub use teardown::{TeardownReport, teardown};
