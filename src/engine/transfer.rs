// ==========================================
// 预算承诺控制引擎 - 调拨执行器
// ==========================================
// PENDING -> EXECUTED 恰好一次:
// 锁定双方预算线 -> 最新快照 -> 校验调出方 -> 单一事务
// (状态 CAS、双方 dotation_actuelle、流水、调用方钩子)
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::domain::availability::LedgerSnapshot;
use crate::domain::budget_line::LineTotalsUpdate;
use crate::domain::movement::BudgetMovement;
use crate::domain::transfer::CreditTransfer;
use crate::domain::types::{MovementType, TransferStatus};
use crate::engine::availability::AvailabilityCalculator;
use crate::engine::error::{CommitmentError, CommitmentResult};
use crate::engine::line_lock::LineLockRegistry;
use crate::engine::repositories::{snapshot_for, LedgerRepositories};
use crate::engine::validator::AllocationCheck;
use crate::repository::{BudgetLineRepository, MovementRepository, TransferRepository};

pub struct TransferExecutor {
    repos: LedgerRepositories,
    locks: Arc<LineLockRegistry>,
}

impl TransferExecutor {
    pub fn new(repos: LedgerRepositories, locks: Arc<LineLockRegistry>) -> Self {
        Self { repos, locks }
    }

    pub fn execute(&self, transfer_id: &str, actor: &str) -> CommitmentResult<CreditTransfer> {
        self.execute_with(transfer_id, actor, |_, _| Ok(()))
    }

    /// 执行待执行的调拨
    ///
    /// # 错误
    /// - `NotFound`: 调拨或预算线不存在
    /// - `InvalidRequest`: 调拨不处于待执行状态
    /// - `InsufficientFunds`: 调出方 disponible_net 低于金额
    /// - `ConcurrencyConflict`: 锁超时,或调拨、预算线已变化
    #[instrument(skip(self, on_commit))]
    pub fn execute_with<F>(
        &self,
        transfer_id: &str,
        actor: &str,
        on_commit: F,
    ) -> CommitmentResult<CreditTransfer>
    where
        F: FnOnce(&Transaction, &CreditTransfer) -> CommitmentResult<()>,
    {
        let transfer = self.load_pending(transfer_id)?;
        let line_ids = transfer.line_ids();
        let _locks = self.locks.acquire(&line_ids)?;

        // 等待期间可能已有其他执行者完成
        let transfer = self.load_pending(transfer_id)?;
        let snapshots = self.repos.load_snapshots(transfer.exercice, &line_ids)?;

        if let Some(from) = &transfer.from_budget_line_id {
            let source = snapshot_for(&snapshots, from)?;
            check_source(source, &transfer)?;
        }

        let now = Utc::now().naive_utc();
        let mut executed = transfer.clone();
        executed.status = TransferStatus::Executed;
        executed.executed_by = Some(actor.to_string());
        executed.executed_at = Some(now);

        self.repos.unit_of_work.run(|tx| -> CommitmentResult<()> {
            if !TransferRepository::mark_executed_tx(tx, &transfer.transfer_id, actor, now)? {
                return Err(CommitmentError::conflict(format!(
                    "transfer {} is no longer pending",
                    transfer.code
                )));
            }

            if let Some(from) = &transfer.from_budget_line_id {
                shift_allocation_tx(
                    tx,
                    snapshot_for(&snapshots, from)?,
                    -transfer.amount,
                    MovementType::TransferOut,
                    &transfer.transfer_id,
                    actor,
                    now,
                )?;
            }
            shift_allocation_tx(
                tx,
                snapshot_for(&snapshots, &transfer.to_budget_line_id)?,
                transfer.amount,
                MovementType::TransferIn,
                &transfer.transfer_id,
                actor,
                now,
            )?;

            on_commit(tx, &executed)
        })?;

        info!(
            code = %executed.code,
            amount = %executed.amount,
            from = ?executed.from_budget_line_id,
            to = %executed.to_budget_line_id,
            "transfer executed"
        );
        Ok(executed)
    }

    fn load_pending(&self, transfer_id: &str) -> CommitmentResult<CreditTransfer> {
        let transfer = self
            .repos
            .transfer_repo
            .find_by_id(transfer_id)?
            .ok_or_else(|| CommitmentError::not_found("CreditTransfer", transfer_id))?;

        if !transfer.is_pending() {
            return Err(CommitmentError::InvalidRequest(format!(
                "transfer {} is {}, only PENDING transfers can change",
                transfer.code, transfer.status
            )));
        }
        Ok(transfer)
    }
}

fn check_source(source: &LedgerSnapshot, transfer: &CreditTransfer) -> CommitmentResult<()> {
    let breakdown = AvailabilityCalculator::compute(source, None);
    if breakdown.covers(transfer.amount) {
        return Ok(());
    }

    let deficit = breakdown.deficit_for(transfer.amount);
    warn!(
        code = %transfer.code,
        source = %breakdown.code,
        disponible_net = %breakdown.disponible_net,
        %deficit,
        "transfer source cannot cover the amount"
    );
    Err(CommitmentError::InsufficientFunds {
        deficit,
        shortfalls: vec![AllocationCheck {
            budget_line_id: breakdown.budget_line_id.clone(),
            code: breakdown.code.clone(),
            amount: transfer.amount,
            disponible_net: breakdown.disponible_net,
            sufficient: false,
            deficit,
        }],
    })
}

/// 按 `delta` 调整单条预算线的 dotation_actuelle 并记流水
fn shift_allocation_tx(
    tx: &Transaction,
    snapshot: &LedgerSnapshot,
    delta: Decimal,
    movement_type: MovementType,
    transfer_id: &str,
    actor: &str,
    now: NaiveDateTime,
) -> CommitmentResult<()> {
    let before = AvailabilityCalculator::compute(snapshot, None);

    let mut update = LineTotalsUpdate::from_line(&snapshot.line);
    update.current_allocation = before.dotation_actuelle + delta;
    BudgetLineRepository::update_totals_tx(tx, &update, now)?;

    MovementRepository::insert_tx(
        tx,
        &BudgetMovement::new(
            &snapshot.line.budget_line_id,
            movement_type,
            delta,
            (before.disponible_net, before.disponible_net + delta),
            transfer_id,
            actor,
            now,
        ),
    )?;
    Ok(())
}
