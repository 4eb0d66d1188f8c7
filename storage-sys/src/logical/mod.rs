//! Commands for the stacked layers: arrays, volume groups and btrfs subvolumes

pub mod btrfs_tools;
pub mod lvm_tools;
pub mod mdadm_tools;

pub use lvm_tools::LvExtent;
pub use mdadm_tools::{MdArrayScan, MdMetadata, parse_mdadm_scan};
