// ==========================================
// 预算承诺控制引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 每次 Connection::open 的 PRAGMA 行为一致
// - 统一 busy_timeout,并发写入时等待而不是直接失败
// - 内嵌唯一的表结构,通过 schema_version 管理版本
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// `init_schema` 写入的表结构版本
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 完整表结构。金额以 TEXT 存储,读回时精确解析。
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS budget_line (
    budget_line_id TEXT PRIMARY KEY,
    code TEXT NOT NULL,
    label TEXT NOT NULL,
    exercice INTEGER NOT NULL,
    initial_allocation TEXT NOT NULL,
    current_allocation TEXT NOT NULL,
    cumulative_committed TEXT NOT NULL DEFAULT '0',
    reserved_amount TEXT NOT NULL DEFAULT '0',
    active INTEGER NOT NULL DEFAULT 1,
    revision INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(exercice, code)
);

CREATE TABLE IF NOT EXISTS credit_transfer (
    transfer_id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    exercice INTEGER NOT NULL,
    from_budget_line_id TEXT REFERENCES budget_line(budget_line_id),
    to_budget_line_id TEXT NOT NULL REFERENCES budget_line(budget_line_id),
    amount TEXT NOT NULL,
    motif TEXT NOT NULL,
    status TEXT NOT NULL,
    requested_by TEXT NOT NULL,
    requested_at TEXT NOT NULL,
    executed_by TEXT,
    executed_at TEXT,
    cancelled_by TEXT,
    cancelled_at TEXT,
    cancel_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_transfer_to_line ON credit_transfer(to_budget_line_id, status);
CREATE INDEX IF NOT EXISTS idx_transfer_from_line ON credit_transfer(from_budget_line_id, status);

CREATE TABLE IF NOT EXISTS commitment_request (
    request_id TEXT PRIMARY KEY,
    exercice INTEGER NOT NULL,
    object TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    forced INTEGER NOT NULL DEFAULT 0,
    justification TEXT,
    status TEXT NOT NULL,
    motif TEXT,
    date_reprise TEXT,
    verdict_snapshot_json TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    submitted_by TEXT,
    submitted_at TEXT,
    deferred_by TEXT,
    deferred_at TEXT,
    decided_by TEXT,
    decided_at TEXT,
    updated_at TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_commitment_status ON commitment_request(exercice, status);

CREATE TABLE IF NOT EXISTS commitment_allocation (
    request_id TEXT NOT NULL REFERENCES commitment_request(request_id) ON DELETE CASCADE,
    seq_no INTEGER NOT NULL,
    budget_line_id TEXT NOT NULL REFERENCES budget_line(budget_line_id),
    amount TEXT NOT NULL,
    PRIMARY KEY (request_id, seq_no)
);

CREATE TABLE IF NOT EXISTS reservation (
    reservation_id TEXT PRIMARY KEY,
    request_id TEXT NOT NULL REFERENCES commitment_request(request_id),
    budget_line_id TEXT NOT NULL REFERENCES budget_line(budget_line_id),
    amount TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    closed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_reservation_line_state ON reservation(budget_line_id, state);
CREATE INDEX IF NOT EXISTS idx_reservation_request ON reservation(request_id);

CREATE TABLE IF NOT EXISTS budget_movement (
    movement_id TEXT PRIMARY KEY,
    budget_line_id TEXT NOT NULL REFERENCES budget_line(budget_line_id),
    movement_type TEXT NOT NULL,
    delta TEXT NOT NULL,
    disponible_avant TEXT NOT NULL,
    disponible_apres TEXT NOT NULL,
    ref_id TEXT NOT NULL,
    actor TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movement_line ON budget_movement(budget_line_id, created_at);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    payload_json TEXT,
    detail TEXT
);

CREATE INDEX IF NOT EXISTS idx_action_log_entity ON action_log(entity_type, entity_id, action_ts);
"#;

/// 应用统一的 PRAGMA 设置
///
/// foreign_keys 与 busy_timeout 是连接级设置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 以统一配置打开 SQLite 连接
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 创建全部表(幂等)并记录表结构版本
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version(表不存在时为 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
