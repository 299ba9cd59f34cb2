// ==========================================
// 预算承诺控制引擎 - 配置层
// ==========================================
// 存储: config_kv 表
// ==========================================

pub mod commitment_policy;
pub mod config_manager;

pub use commitment_policy::CommitmentPolicy;
pub use config_manager::{config_keys, ConfigManager};
