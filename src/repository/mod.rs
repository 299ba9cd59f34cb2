// ==========================================
// 预算承诺控制引擎 - 仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 基于 rusqlite 的数据访问,只用参数化查询
// 多表写入经由 `UnitOfWork` + `_tx` 函数
// ==========================================

pub mod action_log_repo;
pub mod budget_line_repo;
pub mod commitment_repo;
pub mod error;
pub mod ledger_reader;
pub mod movement_repo;
pub mod reservation_repo;
pub(crate) mod row_utils;
pub mod transfer_repo;
pub mod unit_of_work;

// 重新导出
pub use action_log_repo::ActionLogRepository;
pub use budget_line_repo::BudgetLineRepository;
pub use commitment_repo::CommitmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use ledger_reader::LedgerReader;
pub use movement_repo::MovementRepository;
pub use reservation_repo::ReservationRepository;
pub use transfer_repo::TransferRepository;
pub use unit_of_work::UnitOfWork;
