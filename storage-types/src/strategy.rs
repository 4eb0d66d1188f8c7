//! Partitioning strategy types
//!
//! A strategy is a closed set of layouts. Each variant carries only the options that
//! layout consumes, so the orchestrator can match exhaustively on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Encryption passphrase.
///
/// Never printed: `Debug` and `Display` are redacted, and command rendering keeps it
/// off the argument list.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// Options for layouts that open encryption containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptionOptions {
    /// Passphrase for every container opened in the run
    #[serde(default)]
    pub passphrase: Passphrase,

    /// Mapper name of the root container (`/dev/mapper/<name>`)
    #[serde(default = "default_root_mapper")]
    pub root_mapper: String,

    /// Mapper name of the separate home container
    #[serde(default = "default_home_mapper")]
    pub home_mapper: String,
}

impl EncryptionOptions {
    pub fn with_passphrase(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: Passphrase::new(passphrase),
            root_mapper: default_root_mapper(),
            home_mapper: default_home_mapper(),
        }
    }
}

fn default_root_mapper() -> String {
    "cryptroot".to_string()
}

fn default_home_mapper() -> String {
    "crypthome".to_string()
}

/// Options for layouts that carve logical volumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LvmOptions {
    /// Volume group name
    #[serde(default = "default_volume_group")]
    pub volume_group: String,

    /// Share of the group's free extents given to the root volume (1-99).
    ///
    /// Root is carved first and never takes 100%, leaving slack for swap and
    /// snapshots; home (if requested) takes whatever is left at the end.
    #[serde(default = "default_root_percent_free")]
    pub root_percent_free: u8,
}

impl Default for LvmOptions {
    fn default() -> Self {
        Self {
            volume_group: default_volume_group(),
            root_percent_free: default_root_percent_free(),
        }
    }
}

fn default_volume_group() -> String {
    "vg0".to_string()
}

fn default_root_percent_free() -> u8 {
    90
}

/// Partitioning strategy requested for a run
///
/// Deserialization rejects options the selected layout does not consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", from = "StrategyRepr")]
pub enum Strategy {
    /// One disk, plain filesystems on partitions
    Simple,
    /// One disk, encryption containers on the data partitions
    SimpleLuks(EncryptionOptions),
    /// Mirrored boot array and redundant data array carrying a volume group
    RaidLvm(LvmOptions),
    /// Redundant arrays with an encryption container on the data array
    RaidLuks(EncryptionOptions),
    /// Encryption container on the data array carrying a volume group
    RaidLvmLuks {
        #[serde(flatten)]
        encryption: EncryptionOptions,
        #[serde(flatten)]
        lvm: LvmOptions,
    },
}

/// Wire form of [`Strategy`]
///
/// Flattened fields cannot deny unknown keys, so the combined layout spells out
/// both option sets here.
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
enum StrategyRepr {
    Simple {},
    SimpleLuks(EncryptionOptions),
    RaidLvm(LvmOptions),
    RaidLuks(EncryptionOptions),
    RaidLvmLuks {
        #[serde(default)]
        passphrase: Passphrase,
        #[serde(default = "default_root_mapper")]
        root_mapper: String,
        #[serde(default = "default_home_mapper")]
        home_mapper: String,
        #[serde(default = "default_volume_group")]
        volume_group: String,
        #[serde(default = "default_root_percent_free")]
        root_percent_free: u8,
    },
}

impl From<StrategyRepr> for Strategy {
    fn from(repr: StrategyRepr) -> Self {
        match repr {
            StrategyRepr::Simple {} => Strategy::Simple,
            StrategyRepr::SimpleLuks(options) => Strategy::SimpleLuks(options),
            StrategyRepr::RaidLvm(options) => Strategy::RaidLvm(options),
            StrategyRepr::RaidLuks(options) => Strategy::RaidLuks(options),
            StrategyRepr::RaidLvmLuks {
                passphrase,
                root_mapper,
                home_mapper,
                volume_group,
                root_percent_free,
            } => Strategy::RaidLvmLuks {
                encryption: EncryptionOptions {
                    passphrase,
                    root_mapper,
                    home_mapper,
                },
                lvm: LvmOptions {
                    volume_group,
                    root_percent_free,
                },
            },
        }
    }
}

/// How many disks a strategy accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskRequirement {
    Exactly(usize),
    AtLeast(usize),
}

impl DiskRequirement {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            DiskRequirement::Exactly(n) => count == n,
            DiskRequirement::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for DiskRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskRequirement::Exactly(n) => write!(f, "exactly {n}"),
            DiskRequirement::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

impl Strategy {
    /// Plan-file name of the strategy
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::SimpleLuks(_) => "simple_luks",
            Strategy::RaidLvm(_) => "raid_lvm",
            Strategy::RaidLuks(_) => "raid_luks",
            Strategy::RaidLvmLuks { .. } => "raid_lvm_luks",
        }
    }

    pub fn is_raid(&self) -> bool {
        matches!(
            self,
            Strategy::RaidLvm(_) | Strategy::RaidLuks(_) | Strategy::RaidLvmLuks { .. }
        )
    }

    /// Swap and home live in logical volumes instead of partitions
    pub fn uses_lvm(&self) -> bool {
        matches!(self, Strategy::RaidLvm(_) | Strategy::RaidLvmLuks { .. })
    }

    pub fn disk_requirement(&self) -> DiskRequirement {
        if self.is_raid() {
            DiskRequirement::AtLeast(2)
        } else {
            DiskRequirement::Exactly(1)
        }
    }

    pub fn encryption(&self) -> Option<&EncryptionOptions> {
        match self {
            Strategy::SimpleLuks(options) | Strategy::RaidLuks(options) => Some(options),
            Strategy::RaidLvmLuks { encryption, .. } => Some(encryption),
            Strategy::Simple | Strategy::RaidLvm(_) => None,
        }
    }

    /// Mutable access used by the config layer to inject a passphrase from the environment
    pub fn encryption_mut(&mut self) -> Option<&mut EncryptionOptions> {
        match self {
            Strategy::SimpleLuks(options) | Strategy::RaidLuks(options) => Some(options),
            Strategy::RaidLvmLuks { encryption, .. } => Some(encryption),
            Strategy::Simple | Strategy::RaidLvm(_) => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
