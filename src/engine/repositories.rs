// ==========================================
// 预算承诺控制引擎 - 引擎仓储集合
// ==========================================
// 账本引擎所需的全部仓储,共用一个连接
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::domain::availability::LedgerSnapshot;
use crate::engine::error::{CommitmentError, CommitmentResult};
use crate::repository::{
    ActionLogRepository, BudgetLineRepository, CommitmentRepository, LedgerReader,
    MovementRepository, ReservationRepository, TransferRepository, UnitOfWork,
};

#[derive(Clone)]
pub struct LedgerRepositories {
    pub ledger: Arc<dyn LedgerReader>,
    pub line_repo: Arc<BudgetLineRepository>,
    pub commitment_repo: Arc<CommitmentRepository>,
    pub reservation_repo: Arc<ReservationRepository>,
    pub transfer_repo: Arc<TransferRepository>,
    pub movement_repo: Arc<MovementRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub unit_of_work: UnitOfWork,
}

impl LedgerRepositories {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        let line_repo = Arc::new(BudgetLineRepository::new(conn.clone()));
        Self {
            ledger: line_repo.clone(),
            line_repo,
            commitment_repo: Arc::new(CommitmentRepository::new(conn.clone())),
            reservation_repo: Arc::new(ReservationRepository::new(conn.clone())),
            transfer_repo: Arc::new(TransferRepository::new(conn.clone())),
            movement_repo: Arc::new(MovementRepository::new(conn.clone())),
            action_log_repo: Arc::new(ActionLogRepository::new(conn.clone())),
            unit_of_work: UnitOfWork::new(conn),
        }
    }

    /// `exercice` 中 `budget_line_ids` 的最新快照
    ///
    /// # 错误
    /// - `NotFound`: 预算线在本年度不存在
    pub fn load_snapshots<S: AsRef<str>>(
        &self,
        exercice: i32,
        budget_line_ids: &[S],
    ) -> CommitmentResult<Vec<LedgerSnapshot>> {
        budget_line_ids
            .iter()
            .map(|id| {
                self.ledger
                    .load_snapshot(id.as_ref(), exercice)?
                    .ok_or_else(|| CommitmentError::not_found("BudgetLine", id.as_ref()))
            })
            .collect()
    }
}

/// 从已加载集合中取出单条预算线的快照
pub(crate) fn snapshot_for<'a>(
    snapshots: &'a [LedgerSnapshot],
    budget_line_id: &str,
) -> CommitmentResult<&'a LedgerSnapshot> {
    snapshots
        .iter()
        .find(|s| s.line.budget_line_id == budget_line_id)
        .ok_or_else(|| CommitmentError::not_found("BudgetLine", budget_line_id))
}
