use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::datetime_to_sql;
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

const INSERT_SQL: &str = r#"
    INSERT INTO action_log (
        action_id, entity_type, entity_id, action_type, action_ts, actor,
        payload_json, detail
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

// ==========================================
// ActionLogRepository - 审计日志仓储
// ==========================================
// 红线: 只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 插入一条审计记录
    ///
    /// # 返回
    /// - `Ok(action_id)`
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert_with(&conn, log)?;
        Ok(log.action_id.clone())
    }

    /// 在调用方事务内插入一条审计记录
    pub fn insert_tx(tx: &Transaction, log: &ActionLog) -> RepositoryResult<String> {
        insert_with(tx, log)?;
        Ok(log.action_id.clone())
    }
}

fn insert_with(conn: &Connection, log: &ActionLog) -> RepositoryResult<()> {
    conn.execute(
        INSERT_SQL,
        params![
            log.action_id,
            log.entity_type,
            log.entity_id,
            log.action_type,
            datetime_to_sql(&log.action_ts),
            log.actor,
            log.payload_json.as_ref().map(|v| v.to_string()),
            log.detail,
        ],
    )?;
    Ok(())
}
