// ==========================================
// 采购订单全流程系统 - 值班会话引擎
// ==========================================
// 红线: 每个用户任意时刻至多一个 active 会话
// 上岗时先关闭已有 active 会话，再开启新会话（同一事务）
// ==========================================

use crate::domain::audit::{ActionType, AuditEvent};
use crate::domain::duty::DutySession;
use crate::domain::types::EntityKind;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{AuditRepository, DutySessionRepository};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, instrument};

pub struct DutyEngine;

impl DutyEngine {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, conn))]
    pub fn start_duty(&self, conn: &Connection, user_id: &str) -> EngineResult<DutySession> {
        let user_id = require_user(user_id)?;

        let previous = DutySessionRepository::find_active(conn, user_id)?;
        if previous.is_some() {
            DutySessionRepository::close_active(conn, user_id, Utc::now())?;
        }

        let session = DutySession::open(user_id);
        DutySessionRepository::insert(conn, &session)?;

        let mut event = AuditEvent::new(
            ActionType::DutyStart,
            user_id,
            EntityKind::DutySession,
            &session.session_id,
        )
        .with_after(&session);
        if let Some(prev) = &previous {
            event = event.with_detail(format!("自动关闭上一会话 {}", prev.session_id));
        }
        AuditRepository::insert(conn, &event)?;

        info!(
            user_id,
            session_id = %session.session_id,
            closed_previous = previous.is_some(),
            "值班会话已开启"
        );
        Ok(session)
    }

    /// 结束值班；没有 active 会话时返回 None
    #[instrument(skip(self, conn))]
    pub fn end_duty(&self, conn: &Connection, user_id: &str) -> EngineResult<Option<DutySession>> {
        let user_id = require_user(user_id)?;

        let Some(mut session) = DutySessionRepository::find_active(conn, user_id)? else {
            info!(user_id, "没有需要结束的值班会话");
            return Ok(None);
        };

        let ended_at = Utc::now();
        DutySessionRepository::close_active(conn, user_id, ended_at)?;
        let before = session.clone();
        session.active = false;
        session.ended_at = Some(ended_at);

        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::DutyEnd,
                user_id,
                EntityKind::DutySession,
                &session.session_id,
            )
            .with_before(&before)
            .with_after(&session),
        )?;

        info!(user_id, session_id = %session.session_id, "值班会话已结束");
        Ok(Some(session))
    }

    pub fn active_session(&self, conn: &Connection, user_id: &str) -> EngineResult<Option<DutySession>> {
        Ok(DutySessionRepository::find_active(conn, user_id.trim())?)
    }
}

impl Default for DutyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn require_user(user_id: &str) -> EngineResult<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation("用户不能为空".to_string()));
    }
    Ok(trimmed)
}
