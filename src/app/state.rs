// ==========================================
// 预算承诺控制引擎 - 应用状态
// ==========================================
// 将同一个共享连接装配到仓储、引擎与 API
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{BudgetApi, CommitmentApi, TransferApi};
use crate::config::{CommitmentPolicy, ConfigManager};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{
    CommitmentValidator, LedgerRepositories, LineLockRegistry, ReservationManager, TransferExecutor,
};

/// 所有命令共享的应用状态
pub struct AppState {
    pub db_path: String,

    /// 启动时加载的策略;配置修改在下次启动时生效
    pub policy: CommitmentPolicy,

    pub commitment_api: Arc<CommitmentApi>,
    pub transfer_api: Arc<TransferApi>,
    pub budget_api: Arc<BudgetApi>,
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 打开(必要时创建)`db_path` 处的数据库
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "initialising application state");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("cannot open database {}: {}", db_path, e))?;
        init_schema(&conn).map_err(|e| format!("cannot initialise schema: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 基于已打开的连接构建(要求表结构已存在)
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("cannot create ConfigManager: {}", e))?,
        );
        let policy = config_manager
            .load_policy()
            .map_err(|e| format!("cannot load policy: {}", e))?;
        tracing::info!(
            justification_min_length = policy.justification_min_length,
            line_lock_timeout_ms = policy.line_lock_timeout_ms,
            operating_exercice = ?policy.operating_exercice,
            alert_threshold_pct = %policy.alert_threshold_pct,
            "policy loaded"
        );

        // ==========================================
        // 仓储 + 引擎
        // ==========================================
        let repos = LedgerRepositories::from_connection(conn);
        let locks = Arc::new(LineLockRegistry::new(policy.line_lock_timeout()));

        let reservations = Arc::new(ReservationManager::new(
            repos.clone(),
            locks.clone(),
            CommitmentValidator::from_policy(&policy),
        ));
        let executor = Arc::new(TransferExecutor::new(repos.clone(), locks));

        // ==========================================
        // API
        // ==========================================
        let commitment_api = Arc::new(CommitmentApi::new(repos.clone(), reservations));
        let transfer_api = Arc::new(TransferApi::new(repos.clone(), executor));
        let budget_api = Arc::new(BudgetApi::new(repos, policy.alert_threshold_pct));

        tracing::info!("application state ready");

        Ok(Self {
            db_path,
            policy,
            commitment_api,
            transfer_api,
            budget_api,
            config_manager,
        })
    }

    /// 优先使用显式年度,否则使用配置的当前年度
    pub fn resolve_exercice(&self, exercice: Option<i32>) -> Result<i32, String> {
        exercice
            .or(self.policy.operating_exercice)
            .ok_or_else(|| "exercice is required (no operating_exercice configured)".to_string())
    }
}

/// 默认数据库路径
///
/// 优先使用 BUDGET_COMMITMENT_DB_PATH;否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("BUDGET_COMMITMENT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./budget_commitment.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("budget-commitment");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("budget_commitment.db");
        }
    }
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_on_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        let state = AppState::new(db_path).unwrap();
        assert_eq!(state.policy, CommitmentPolicy::default());
        assert!(state.resolve_exercice(None).is_err());
        assert_eq!(state.resolve_exercice(Some(2026)).unwrap(), 2026);
    }

    #[test]
    fn test_operating_exercice_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        {
            let conn = open_sqlite_connection(&db_path).unwrap();
            init_schema(&conn).unwrap();
            let manager = ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap();
            manager
                .set_global_config_value(crate::config::config_keys::OPERATING_EXERCICE, "2027")
                .unwrap();
        }

        let state = AppState::new(db_path).unwrap();
        assert_eq!(state.resolve_exercice(None).unwrap(), 2027);
    }
}
