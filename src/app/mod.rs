// ==========================================
// 预算承诺控制引擎 - 应用层
// ==========================================
// 状态装配与异步命令接口
// ==========================================

pub mod commands;
pub mod state;

pub use commands::{dispatch, ErrorResponse, COMMANDS};
pub use state::{get_default_db_path, AppState};
