//! Macro source layers and their precedence

use std::fmt;

use serde::{Deserialize, Serialize};

/// One source of macro values. Declaration order is precedence order:
/// later layers overwrite earlier ones key by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayer {
    Core,
    SystemGlobal,
    SystemProfile,
    UserGlobal,
    UserProfile,
    LocalGlobal,
    LocalProfile,
    Instance,
    Environment,
    Override,
}

impl ConfigLayer {
    /// All layers, lowest precedence first
    pub const ALL: [ConfigLayer; 10] = [
        ConfigLayer::Core,
        ConfigLayer::SystemGlobal,
        ConfigLayer::SystemProfile,
        ConfigLayer::UserGlobal,
        ConfigLayer::UserProfile,
        ConfigLayer::LocalGlobal,
        ConfigLayer::LocalProfile,
        ConfigLayer::Instance,
        ConfigLayer::Environment,
        ConfigLayer::Override,
    ];

    /// Precedence rank (higher wins)
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigLayer::Core => "core",
            ConfigLayer::SystemGlobal => "system_global",
            ConfigLayer::SystemProfile => "system_profile",
            ConfigLayer::UserGlobal => "user_global",
            ConfigLayer::UserProfile => "user_profile",
            ConfigLayer::LocalGlobal => "local_global",
            ConfigLayer::LocalProfile => "local_profile",
            ConfigLayer::Instance => "instance",
            ConfigLayer::Environment => "environment",
            ConfigLayer::Override => "override",
        }
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
