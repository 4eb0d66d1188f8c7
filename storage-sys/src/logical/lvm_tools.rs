use std::path::Path;

use storage_types::SizeMib;

use crate::cmd::ToolCommand;

/// How much of a volume group a new logical volume takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LvExtent {
    /// Percentage of the group's free extents at creation time
    PercentFree(u8),
    Size(SizeMib),
}

pub fn pvcreate(device: &Path) -> ToolCommand {
    ToolCommand::new("pvcreate")
        .arg("--yes")
        .arg(device.display().to_string())
}

pub fn vgcreate(volume_group: &str, physical_volume: &Path) -> ToolCommand {
    ToolCommand::new("vgcreate")
        .arg(volume_group)
        .arg(physical_volume.display().to_string())
}

pub fn lvcreate(volume_group: &str, name: &str, extent: LvExtent) -> ToolCommand {
    let command = ToolCommand::new("lvcreate").arg("--yes");
    let command = match extent {
        LvExtent::PercentFree(percent) => command.args(["-l".to_string(), format!("{percent}%FREE")]),
        LvExtent::Size(size) => command.args(["-L".to_string(), format!("{}M", size.get())]),
    };
    command.args(["-n", name, volume_group])
}

/// Deactivate every logical volume of a group
pub fn vgchange_deactivate(volume_group: &str) -> ToolCommand {
    ToolCommand::new("vgchange").args(["--activate", "n", volume_group])
}
