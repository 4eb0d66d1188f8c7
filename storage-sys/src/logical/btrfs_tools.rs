use std::path::Path;

use crate::cmd::ToolCommand;

pub fn subvolume_create(path: &Path) -> ToolCommand {
    ToolCommand::new("btrfs")
        .args(["subvolume", "create"])
        .arg(path.display().to_string())
}
