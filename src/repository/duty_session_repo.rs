// ==========================================
// 采购订单全流程系统 - 值班会话仓储
// ==========================================
// 红线: 部分唯一索引 ux_duty_session_active 保证每用户至多一个 active 会话
// ==========================================

use crate::domain::duty::DutySession;
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

pub struct DutySessionRepository;

const SELECT_COLUMNS: &str = "session_id, user_id, started_at, ended_at, active";

impl DutySessionRepository {
    pub fn find_active(conn: &Connection, user_id: &str) -> RepositoryResult<Option<DutySession>> {
        let found = conn
            .query_row(
                &format!(
                    "SELECT {} FROM duty_session WHERE user_id = ?1 AND active = 1",
                    SELECT_COLUMNS
                ),
                params![user_id],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    /// 关闭用户当前 active 会话，返回被关闭的行数 (0 或 1)
    pub fn close_active(
        conn: &Connection,
        user_id: &str,
        ended_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "UPDATE duty_session SET active = 0, ended_at = ?1 WHERE user_id = ?2 AND active = 1",
            params![ended_at, user_id],
        )?;
        Ok(rows)
    }

    pub fn insert(conn: &Connection, session: &DutySession) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO duty_session (session_id, user_id, started_at, ended_at, active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                session.session_id,
                session.user_id,
                session.started_at,
                session.ended_at,
                session.active as i32,
            ],
        )?;
        Ok(())
    }

    /// 用户会话历史（最新在前）
    pub fn list_by_user(conn: &Connection, user_id: &str) -> RepositoryResult<Vec<DutySession>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM duty_session WHERE user_id = ?1 ORDER BY started_at DESC",
            SELECT_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![user_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn count_active(conn: &Connection, user_id: &str) -> RepositoryResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM duty_session WHERE user_id = ?1 AND active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_row(row: &Row) -> rusqlite::Result<DutySession> {
        Ok(DutySession {
            session_id: row.get(0)?,
            user_id: row.get(1)?,
            started_at: row.get(2)?,
            ended_at: row.get(3)?,
            active: row.get::<_, i32>(4)? != 0,
        })
    }
}
