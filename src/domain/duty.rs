// ==========================================
// 采购订单全流程系统 - 值班会话领域模型
// ==========================================
// 红线: 每个用户任意时刻至多一个 active 会话
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutySession {
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl DutySession {
    pub fn open(user_id: &str) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            active: true,
        }
    }
}
