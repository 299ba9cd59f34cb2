// ==========================================
// 预算承诺控制引擎 - 配置管理器
// ==========================================
// 职责: 加载、查询与覆盖配置
// 存储: config_kv 表 (scope_id = 'global')
// ==========================================

use crate::config::commitment_policy::{
    CommitmentPolicy, DEFAULT_ALERT_THRESHOLD_PCT, DEFAULT_JUSTIFICATION_MIN_LENGTH,
    DEFAULT_LINE_LOCK_TIMEOUT_MS,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 共享已有连接
    ///
    /// 重新应用统一的 PRAGMA 设置(幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取全局配置值
    ///
    /// # 返回
    /// - Some(String): 已配置的值
    /// - None: 未配置该键
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入或更新全局配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 全部全局键值,以 JSON 对象字符串返回
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&config_map).map_err(|e| RepositoryError::Other(e.into()))
    }

    // ===== 承诺策略 =====

    /// 加载强类型策略;无法解析的值回退为默认值
    pub fn load_policy(&self) -> RepositoryResult<CommitmentPolicy> {
        let justification_min_length = self.parse_or(
            config_keys::JUSTIFICATION_MIN_LENGTH,
            DEFAULT_JUSTIFICATION_MIN_LENGTH,
        )?;
        let line_lock_timeout_ms =
            self.parse_or(config_keys::LINE_LOCK_TIMEOUT_MS, DEFAULT_LINE_LOCK_TIMEOUT_MS)?;
        let key = config_keys::OPERATING_EXERCICE;
        let operating_exercice = match self.get_global_config_value(key)? {
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(key, value = %raw, "ignoring unparsable config value");
                    None
                }
            },
            None => None,
        };

        // 百分比,取值 (0, 100]
        let key = config_keys::ALERT_THRESHOLD_PCT;
        let mut alert_threshold_pct = self.parse_or(key, DEFAULT_ALERT_THRESHOLD_PCT)?;
        if alert_threshold_pct <= Decimal::ZERO || alert_threshold_pct > Decimal::ONE_HUNDRED {
            warn!(key, value = %alert_threshold_pct, "alert threshold out of range");
            alert_threshold_pct = DEFAULT_ALERT_THRESHOLD_PCT;
        }

        Ok(CommitmentPolicy {
            justification_min_length,
            line_lock_timeout_ms,
            operating_exercice,
            alert_threshold_pct,
        })
    }

    fn parse_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: std::str::FromStr + Copy,
    {
        match self.get_global_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key, value = %raw, "ignoring unparsable config value");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }
}

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    // 强制入账
    pub const JUSTIFICATION_MIN_LENGTH: &str = "justification_min_length";

    // 预算线锁登记表
    pub const LINE_LOCK_TIMEOUT_MS: &str = "line_lock_timeout_ms";

    // 命令层默认值
    pub const OPERATING_EXERCICE: &str = "operating_exercice";

    // 消耗预警
    pub const ALERT_THRESHOLD_PCT: &str = "alert_threshold_pct";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cm = setup();
        assert_eq!(cm.load_policy().unwrap(), CommitmentPolicy::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let cm = setup();
        cm.set_global_config_value(config_keys::JUSTIFICATION_MIN_LENGTH, "20").unwrap();
        cm.set_global_config_value(config_keys::LINE_LOCK_TIMEOUT_MS, "250").unwrap();
        cm.set_global_config_value(config_keys::OPERATING_EXERCICE, "2026").unwrap();

        let policy = cm.load_policy().unwrap();
        assert_eq!(policy.justification_min_length, 20);
        assert_eq!(policy.line_lock_timeout_ms, 250);
        assert_eq!(policy.operating_exercice, Some(2026));
    }

    #[test]
    fn test_alert_threshold_override_and_range() {
        let cm = setup();
        cm.set_global_config_value(config_keys::ALERT_THRESHOLD_PCT, "72.5").unwrap();
        assert_eq!(
            cm.load_policy().unwrap().alert_threshold_pct,
            Decimal::new(725, 1)
        );

        for raw in ["0", "-5", "120", "quatre-vingt"] {
            cm.set_global_config_value(config_keys::ALERT_THRESHOLD_PCT, raw).unwrap();
            assert_eq!(
                cm.load_policy().unwrap().alert_threshold_pct,
                DEFAULT_ALERT_THRESHOLD_PCT
            );
        }
    }

    #[test]
    fn test_garbage_falls_back_to_default() {
        let cm = setup();
        cm.set_global_config_value(config_keys::JUSTIFICATION_MIN_LENGTH, "dix").unwrap();
        assert_eq!(
            cm.load_policy().unwrap().justification_min_length,
            DEFAULT_JUSTIFICATION_MIN_LENGTH
        );
    }

    #[test]
    fn test_snapshot_lists_global_keys() {
        let cm = setup();
        cm.set_global_config_value(config_keys::LINE_LOCK_TIMEOUT_MS, "100").unwrap();
        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&cm.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get("line_lock_timeout_ms").map(String::as_str), Some("100"));
    }
}
