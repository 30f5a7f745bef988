//! Chain configuration.

use serde::{Deserialize, Serialize};

/// How far a committed write is pushed towards the disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Leave written bytes in the OS page cache.
    #[default]
    Buffered,
    /// Call `sync_data` after every committed write. Variable chains sync
    /// the payload before extending the offset index.
    Synced,
}

/// What a variable chain does at open when its two files disagree.
///
/// A write interrupted between its two files leaves payload bytes past the
/// last indexed offset. Under [`Durability::Buffered`] a power loss can also
/// persist the offset index ahead of the payload; only `Rollback` opens such
/// a chain, the other modes fail with `TruncatedPayload`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Truncate the payload file to the last indexed offset.
    #[default]
    Truncate,
    /// Leave the tail in place; the next append overwrites it.
    Ignore,
    /// Drop trailing offsets that point past the end of the payload file,
    /// then truncate as `Truncate` does.
    Rollback,
}

/// Options shared by every chain kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Write durability.
    pub durability: Durability,

    /// Variable-chain open-time recovery.
    pub recovery: RecoveryMode,

    /// Take an advisory exclusive lock on every backing file.
    pub exclusive: bool,
}

impl ChainConfig {
    /// Configuration that syncs every write.
    pub fn synced() -> Self {
        Self {
            durability: Durability::Synced,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.durability, Durability::Buffered);
        assert_eq!(config.recovery, RecoveryMode::Truncate);
        assert!(!config.exclusive);
    }

    #[test]
    fn test_partial_json() {
        let config: ChainConfig =
            serde_json::from_str(r#"{ "durability": "synced", "exclusive": true }"#).unwrap();
        assert_eq!(config.durability, Durability::Synced);
        assert_eq!(config.recovery, RecoveryMode::Truncate);
        assert!(config.exclusive);
    }

    #[test]
    fn test_recovery_modes_by_name() {
        let config: ChainConfig = serde_json::from_str(r#"{ "recovery": "rollback" }"#).unwrap();
        assert_eq!(config.recovery, RecoveryMode::Rollback);
        assert_eq!(config.durability, Durability::Buffered);
    }
}
