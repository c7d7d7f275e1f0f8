// ==========================================
// 采购订单全流程系统 - 离线冲突领域模型
// ==========================================
// 冲突记录只写一次；裁决本身不修改目标实体
// ==========================================

use crate::domain::types::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
    KeepLocal,
    KeepServer,
    ManualMerge,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::KeepLocal => "KEEP_LOCAL",
            ConflictResolution::KeepServer => "KEEP_SERVER",
            ConflictResolution::ManualMerge => "MANUAL_MERGE",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "KEEP_LOCAL" => Some(ConflictResolution::KeepLocal),
            "KEEP_SERVER" => Some(ConflictResolution::KeepServer),
            "MANUAL_MERGE" => Some(ConflictResolution::ManualMerge),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 版本比对结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionCheck {
    Clean,
    Mismatch {
        local_version: String,
        server_version: String,
    },
}

impl VersionCheck {
    pub fn compare(local_version: &str, server_version: &str) -> Self {
        if local_version == server_version {
            VersionCheck::Clean
        } else {
            VersionCheck::Mismatch {
                local_version: local_version.to_string(),
                server_version: server_version.to_string(),
            }
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, VersionCheck::Mismatch { .. })
    }
}

/// 冲突裁决请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolutionRequest {
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub local_version: JsonValue,
    pub server_version: JsonValue,
    pub resolution: ConflictResolution,
    pub reason: String,
}

/// 冲突记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub conflict_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub local_version: JsonValue,
    pub server_version: JsonValue,
    pub resolution: ConflictResolution,
    pub reason: String,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}
