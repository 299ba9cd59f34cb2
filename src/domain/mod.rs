// ==========================================
// 预算承诺控制引擎 - 领域层
// ==========================================
// 职责: 实体、封闭的状态枚举、值对象
// 红线: 不做数据访问,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod availability;
pub mod budget_line;
pub mod commitment;
pub mod movement;
pub mod transfer;
pub mod types;

// 重新导出
pub use action_log::{ActionLog, ActionType};
pub use availability::{
    ActiveReservation, AlertLevel, AvailabilityBreakdown, BudgetSummary, LedgerSnapshot, LineAlert,
};
pub use budget_line::{BudgetLine, LineTotalsUpdate, NewBudgetLine};
pub use commitment::{
    Actor, Allocation, CommitmentInput, CommitmentRequest, Reservation, StatusChange,
};
pub use movement::BudgetMovement;
pub use transfer::{CreditTransfer, NewCreditTransfer};
pub use types::{Capability, CommitmentStatus, MovementType, ReservationState, TransferStatus};
