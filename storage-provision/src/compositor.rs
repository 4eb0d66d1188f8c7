// SPDX-License-Identifier: GPL-3.0-only

//! Block device compositor
//!
//! Builds the device stack a strategy needs on top of the freshly created partitions:
//! arrays over matching partitions of every disk, encryption containers over partitions,
//! and a volume group with logical volumes over the data array. The result is a flat
//! list of [`BlockDeviceNode`]s whose `parents` point down the stack.

use std::path::{Path, PathBuf};

use storage_sys::logical::{LvExtent, MdMetadata, lvm_tools, mdadm_tools, parse_mdadm_scan};
use storage_sys::{Host, luks};
use storage_types::{
    BlockDeviceNode, EncryptionOptions, InstallPlan, LvmOptions, NodeKind, PartitionRole,
    RaidLevel, Strategy, VolumeRole,
};
use tracing::info;

use crate::error::{ProvisionError, Result, Step};
use crate::partition_table::DiskLayout;
use crate::paths::{
    BOOT_ARRAY, DATA_ARRAY, array_path, logical_volume_path, mapper_path, under_target,
    volume_group_path,
};
use crate::step::{create_dir, require_device, run_step};

/// The composed device graph of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStack {
    pub nodes: Vec<BlockDeviceNode>,
    /// Arrays assembled in this run, in creation order
    pub arrays: Vec<PathBuf>,
}

impl DeviceStack {
    fn push(&mut self, node: BlockDeviceNode) {
        self.nodes.push(node);
    }

    /// The node that ends up carrying `role`
    pub fn with_role(&self, role: VolumeRole) -> Option<&BlockDeviceNode> {
        self.nodes.iter().find(|node| node.role == Some(role))
    }

    /// Nodes that carry a filesystem or swap, in creation order
    pub fn volumes(&self) -> impl Iterator<Item = &BlockDeviceNode> {
        self.nodes.iter().filter(|node| node.role.is_some())
    }

    pub fn node(&self, path: &Path) -> Option<&BlockDeviceNode> {
        self.nodes.iter().find(|node| node.path == path)
    }

    /// Backing device of the encryption container at `path`
    pub fn encryption_backing(&self, path: &Path) -> Option<PathBuf> {
        self.node(path)
            .filter(|node| node.is_encrypted())
            .and_then(|node| node.parents.first().cloned())
    }
}

/// Build the device stack for the plan's strategy
pub fn compose<H: Host>(
    host: &mut H,
    plan: &InstallPlan,
    layouts: &[DiskLayout],
) -> Result<DeviceStack> {
    let Some(first) = layouts.first() else {
        return Err(crate::error::PlanError::NoDisks.into());
    };

    info!("composing {} device stack", plan.strategy.name());
    match &plan.strategy {
        Strategy::Simple => Ok(compose_plain(first)),
        Strategy::SimpleLuks(encryption) => compose_encrypted(host, first, encryption),
        Strategy::RaidLvm(lvm) => compose_raid_lvm(host, plan, layouts, lvm),
        Strategy::RaidLuks(_) | Strategy::RaidLvmLuks { .. } => {
            Err(ProvisionError::NotImplemented {
                strategy: plan.strategy.name(),
            })
        }
    }
}

/// Nodes for the ESP, boot and swap partitions of a single disk
fn system_partitions(stack: &mut DeviceStack, layout: &DiskLayout) {
    let roles = [
        (PartitionRole::Esp, VolumeRole::Esp),
        (PartitionRole::Boot, VolumeRole::Boot),
        (PartitionRole::Swap, VolumeRole::Swap),
    ];

    for (partition_role, volume_role) in roles {
        if let Some(spec) = layout.first_with_role(partition_role) {
            stack.push(BlockDeviceNode::partition(
                layout.device(spec),
                Some(volume_role),
            ));
        }
    }
}

/// Root first, then home when the layout carries a second data slot
fn data_roles() -> [VolumeRole; 2] {
    [VolumeRole::Root, VolumeRole::Home]
}

fn compose_plain(layout: &DiskLayout) -> DeviceStack {
    let mut stack = DeviceStack::default();
    system_partitions(&mut stack, layout);

    for (spec, role) in layout.with_role(PartitionRole::Data).zip(data_roles()) {
        stack.push(BlockDeviceNode::partition(layout.device(spec), Some(role)));
    }
    stack
}

/// Format and open one container, returning its clear-text mapping
fn open_container<H: Host>(
    host: &mut H,
    backing: &Path,
    mapper: &str,
    encryption: &EncryptionOptions,
) -> Result<PathBuf> {
    run_step(
        host,
        Step::FormatContainer,
        backing,
        luks::format(backing, &encryption.passphrase),
    )?;
    run_step(
        host,
        Step::OpenContainer,
        backing,
        luks::open(backing, mapper, &encryption.passphrase),
    )?;

    let mapping = mapper_path(mapper);
    require_device(host, Step::OpenContainer, &mapping)?;
    Ok(mapping)
}

fn compose_encrypted<H: Host>(
    host: &mut H,
    layout: &DiskLayout,
    encryption: &EncryptionOptions,
) -> Result<DeviceStack> {
    let mut stack = DeviceStack::default();
    system_partitions(&mut stack, layout);

    let members: Vec<PathBuf> = layout
        .with_role(PartitionRole::LuksMember)
        .map(|spec| layout.device(spec))
        .collect();

    for (backing, role) in members.iter().zip(data_roles()) {
        let mapper = match role {
            VolumeRole::Home => encryption.home_mapper.as_str(),
            _ => encryption.root_mapper.as_str(),
        };
        let mapping = open_container(host, backing, mapper, encryption)?;

        stack.push(BlockDeviceNode::partition(backing.clone(), None));
        stack.push(BlockDeviceNode {
            kind: NodeKind::EncryptedContainer,
            path: mapping,
            parents: vec![backing.clone()],
            role: Some(role),
        });
    }

    Ok(stack)
}

fn assemble_array<H: Host>(
    host: &mut H,
    stack: &mut DeviceStack,
    number: u32,
    level: RaidLevel,
    metadata: MdMetadata,
    members: &[PathBuf],
    role: Option<VolumeRole>,
) -> Result<PathBuf> {
    let array = array_path(number);
    let member_refs: Vec<&Path> = members.iter().map(PathBuf::as_path).collect();

    info!(
        "assembling {} (raid{}) from {} members",
        array.display(),
        level.mdadm_level(),
        members.len()
    );
    run_step(
        host,
        Step::AssembleArray,
        &array,
        mdadm_tools::create_array(&array, level, metadata, &member_refs),
    )?;
    require_device(host, Step::AssembleArray, &array)?;

    for member in members {
        stack.push(BlockDeviceNode::partition(member.clone(), None));
    }
    stack.push(BlockDeviceNode {
        kind: NodeKind::RaidArray { level },
        path: array.clone(),
        parents: members.to_vec(),
        role,
    });
    stack.arrays.push(array.clone());
    Ok(array)
}

fn members_with_role(layouts: &[DiskLayout], role: PartitionRole) -> Vec<PathBuf> {
    layouts
        .iter()
        .filter_map(|layout| layout.first_with_role(role).map(|spec| layout.device(spec)))
        .collect()
}

fn compose_raid_lvm<H: Host>(
    host: &mut H,
    plan: &InstallPlan,
    layouts: &[DiskLayout],
    lvm: &LvmOptions,
) -> Result<DeviceStack> {
    let mut stack = DeviceStack::default();

    // Every disk carries an ESP; only the first one is formatted and mounted
    if let Some(first) = layouts.first()
        && let Some(esp) = first.first_with_role(PartitionRole::Esp)
    {
        stack.push(BlockDeviceNode::partition(
            first.device(esp),
            Some(VolumeRole::Esp),
        ));
    }

    let boot_members = members_with_role(layouts, PartitionRole::Boot);
    assemble_array(
        host,
        &mut stack,
        BOOT_ARRAY,
        RaidLevel::Mirror,
        MdMetadata::V1_0,
        &boot_members,
        Some(VolumeRole::Boot),
    )?;

    let data_members = members_with_role(layouts, PartitionRole::RaidMember);
    let data_array = assemble_array(
        host,
        &mut stack,
        DATA_ARRAY,
        RaidLevel::for_disk_count(layouts.len()),
        MdMetadata::V1_2,
        &data_members,
        None,
    )?;

    let group = lvm.volume_group.as_str();
    run_step(
        host,
        Step::CreatePhysicalVolume,
        &data_array,
        lvm_tools::pvcreate(&data_array),
    )?;
    run_step(
        host,
        Step::CreateVolumeGroup,
        &data_array,
        lvm_tools::vgcreate(group, &data_array),
    )?;

    let group_path = volume_group_path(group);
    stack.push(BlockDeviceNode {
        kind: NodeKind::VolumeGroup,
        path: group_path.clone(),
        parents: vec![data_array],
        role: None,
    });

    let mut volumes = vec![(
        "root",
        VolumeRole::Root,
        LvExtent::PercentFree(lvm.root_percent_free),
    )];
    if let Some(size) = plan.swap.requested() {
        volumes.push(("swap", VolumeRole::Swap, LvExtent::Size(size)));
    }
    if plan.home.enabled {
        volumes.push(("home", VolumeRole::Home, LvExtent::PercentFree(100)));
    }

    for (name, role, extent) in volumes {
        let path = logical_volume_path(group, name);
        run_step(
            host,
            Step::CreateLogicalVolume,
            &path,
            lvm_tools::lvcreate(group, name, extent),
        )?;
        require_device(host, Step::CreateLogicalVolume, &path)?;

        stack.push(BlockDeviceNode {
            kind: NodeKind::LogicalVolume,
            path,
            parents: vec![group_path.clone()],
            role: Some(role),
        });
    }

    Ok(stack)
}

/// Record the assembled arrays in the target's `etc/mdadm.conf`
pub fn write_array_descriptor<H: Host>(
    host: &mut H,
    plan: &InstallPlan,
    stack: &DeviceStack,
) -> Result<()> {
    if stack.arrays.is_empty() {
        return Ok(());
    }

    let etc = under_target(&plan.target_root, "/etc");
    let descriptor = etc.join("mdadm.conf");

    let outcome = run_step(
        host,
        Step::WriteArrayDescriptor,
        &descriptor,
        mdadm_tools::detail_scan(),
    )?;
    let scanned = parse_mdadm_scan(&outcome.stdout);

    for array in &stack.arrays {
        let listed = scanned
            .iter()
            .any(|entry| Path::new(&entry.device) == array.as_path());
        if !listed {
            return Err(ProvisionError::MissingDevice {
                step: Step::WriteArrayDescriptor,
                path: array.clone(),
            });
        }
    }

    create_dir(host, Step::WriteArrayDescriptor, &etc)?;
    info!("writing array descriptor {}", descriptor.display());
    host.append_file(&descriptor, &outcome.stdout)
        .map_err(|source| ProvisionError::Step {
            step: Step::WriteArrayDescriptor,
            device: descriptor.clone(),
            source,
        })
}
