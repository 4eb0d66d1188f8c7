use std::path::Path;

use storage_types::RaidLevel;

use crate::cmd::ToolCommand;

/// One `ARRAY` row of `mdadm --detail --scan`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdArrayScan {
    pub device: String,
    pub name: Option<String>,
    pub uuid: Option<String>,
}

/// Superblock layout of a new array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdMetadata {
    /// Superblock at the end of members; boot code sees each member as a plain filesystem
    V1_0,
    V1_2,
}

impl MdMetadata {
    fn as_arg(self) -> &'static str {
        match self {
            MdMetadata::V1_0 => "1.0",
            MdMetadata::V1_2 => "1.2",
        }
    }
}

pub fn parse_mdadm_scan(output: &str) -> Vec<MdArrayScan> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || !line.starts_with("ARRAY ") {
                return None;
            }

            let mut parts = line.split_whitespace();
            let _array = parts.next()?;
            let device = parts.next()?.to_string();

            let mut name = None;
            let mut uuid = None;

            for token in parts {
                if let Some(value) = token.strip_prefix("name=") {
                    name = Some(value.to_string());
                }
                if let Some(value) = token.strip_prefix("UUID=") {
                    uuid = Some(value.to_string());
                }
            }

            Some(MdArrayScan { device, name, uuid })
        })
        .collect()
}

/// `mdadm --create` without interactive confirmation.
///
/// The array device must stay the first argument after `--create`.
pub fn create_array(
    array: &Path,
    level: RaidLevel,
    metadata: MdMetadata,
    members: &[&Path],
) -> ToolCommand {
    ToolCommand::new("mdadm")
        .arg("--create")
        .arg(array.display().to_string())
        .args([
            "--run".to_string(),
            format!("--level={}", level.mdadm_level()),
            format!("--metadata={}", metadata.as_arg()),
            format!("--raid-devices={}", members.len()),
        ])
        .args(members.iter().map(|member| member.display().to_string()))
}

pub fn detail_scan() -> ToolCommand {
    ToolCommand::new("mdadm").args(["--detail", "--scan"])
}

pub fn stop_array(array: &Path) -> ToolCommand {
    ToolCommand::new("mdadm")
        .arg("--stop")
        .arg(array.display().to_string())
}
