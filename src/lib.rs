// ==========================================
// 预算承诺控制引擎 - 库入口
// ==========================================
// 基于 SQLite 账本的可用额度、入账关口、预留
// 与承诺工作流
// ==========================================

// 实体与封闭枚举(无 I/O)
pub mod domain;

// 数据访问(不含业务规则)
pub mod repository;

// 业务规则(不含 SQL)
pub mod engine;

// 基于 config_kv 的策略
pub mod config;

// 连接初始化 + 表结构
pub mod db;

pub mod logging;

// 业务 API
pub mod api;

// 状态装配 + 命令层
pub mod app;

// ==========================================
// 重新导出
// ==========================================

pub use domain::{
    ActionLog, ActionType, Actor, Allocation, AvailabilityBreakdown, BudgetLine, BudgetSummary,
    CommitmentInput, CommitmentRequest, CommitmentStatus, CreditTransfer, Reservation,
};

pub use engine::{
    AvailabilityCalculator, CommitmentDecision, CommitmentError, CommitmentValidator,
    CommitmentWorkflow, ReservationManager, TransferExecutor,
};

pub use api::{ApiError, BudgetApi, CommitmentApi, TransferApi};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Budget Commitment Engine";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
