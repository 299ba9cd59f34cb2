// ==========================================
// 预算承诺控制引擎 - 引擎层
// ==========================================
// 基于账本快照的业务规则。此处不写 SQL: 读取经由
// LedgerReader,写入经由各仓储的 `_tx` 函数。
// 每次拒绝都携带原因。
// ==========================================

pub mod availability;
pub mod error;
pub mod line_lock;
pub mod repositories;
pub mod reservation;
pub mod transfer;
pub mod validator;
pub mod workflow;

pub use availability::AvailabilityCalculator;
pub use error::{CommitmentError, CommitmentResult};
pub use line_lock::{LineLockGuard, LineLockRegistry};
pub use repositories::LedgerRepositories;
pub use reservation::{ReservationManager, ReserveOutcome};
pub use transfer::TransferExecutor;
pub use validator::{AllocationCheck, CommitmentDecision, CommitmentValidator, ValidationVerdict};
pub use workflow::{CommitmentWorkflow, ReservationEffect, TransitionPlan, WorkflowAction};
