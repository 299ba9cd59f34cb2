// ==========================================
// 预算承诺控制引擎 - 预留管理器
// ==========================================
// reserve: 锁定预算线 -> 最新快照 -> 校验 -> 单一事务
//          (预算线合计、预留记录、流水、调用方钩子)
// release / convert: 流程相同,关闭该申请的生效预留
//
// 调用方钩子在同一事务中执行,工作流状态变更
// 与其预留效果一同提交或回滚。
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::domain::availability::LedgerSnapshot;
use crate::domain::budget_line::LineTotalsUpdate;
use crate::domain::commitment::{CommitmentRequest, Reservation};
use crate::domain::movement::BudgetMovement;
use crate::domain::types::{MovementType, ReservationState};
use crate::engine::availability::AvailabilityCalculator;
use crate::engine::error::{CommitmentError, CommitmentResult};
use crate::engine::line_lock::LineLockRegistry;
use crate::engine::repositories::{snapshot_for, LedgerRepositories};
use crate::engine::validator::{CommitmentValidator, ValidationVerdict};
use crate::repository::{BudgetLineRepository, MovementRepository, ReservationRepository};

/// 预留成功的结果
#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    pub verdict: ValidationVerdict,
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Clone, Copy)]
enum Closing {
    Release,
    Convert,
}

impl Closing {
    fn state(self) -> ReservationState {
        match self {
            Closing::Release => ReservationState::Released,
            Closing::Convert => ReservationState::Converted,
        }
    }
}

// ==========================================
// ReservationManager - 预留管理器
// ==========================================
pub struct ReservationManager {
    repos: LedgerRepositories,
    locks: Arc<LineLockRegistry>,
    validator: CommitmentValidator,
}

impl ReservationManager {
    pub fn new(
        repos: LedgerRepositories,
        locks: Arc<LineLockRegistry>,
        validator: CommitmentValidator,
    ) -> Self {
        Self {
            repos,
            locks,
            validator,
        }
    }

    pub fn validator(&self) -> &CommitmentValidator {
        &self.validator
    }

    // ==========================================
    // 预留
    // ==========================================

    pub fn reserve(
        &self,
        request: &CommitmentRequest,
        actor: &str,
    ) -> CommitmentResult<ReserveOutcome> {
        self.reserve_with(request, actor, |_, _| Ok(()))
    }

    /// 预留 `request` 的每一项分配
    ///
    /// # 错误
    /// - `InsufficientFunds`: 最新结论为额度不足;不写入任何数据
    /// - `ConcurrencyConflict`: 锁超时或 revision 已变化;不写入任何数据
    /// - 校验器返回的任何错误
    #[instrument(skip(self, request, on_commit), fields(request_id = %request.request_id))]
    pub fn reserve_with<F>(
        &self,
        request: &CommitmentRequest,
        actor: &str,
        on_commit: F,
    ) -> CommitmentResult<ReserveOutcome>
    where
        F: FnOnce(&Transaction, &ValidationVerdict) -> CommitmentResult<()>,
    {
        self.validator.check_structure(request)?;
        let line_ids = request.line_ids();
        let _locks = self.locks.acquire(&line_ids)?;

        // 在锁内读取: 这些预算线上先前的预留均可见
        let snapshots = self.repos.load_snapshots(request.exercice, &line_ids)?;
        let verdict = self.validator.validate(request, &snapshots)?;

        let now = Utc::now().naive_utc();
        let reservations: Vec<Reservation> = request
            .allocations
            .iter()
            .map(|allocation| Reservation {
                reservation_id: uuid::Uuid::new_v4().to_string(),
                request_id: request.request_id.clone(),
                budget_line_id: allocation.budget_line_id.clone(),
                amount: allocation.amount,
                state: ReservationState::Active,
                created_at: now,
                closed_at: None,
            })
            .collect();

        self.repos.unit_of_work.run(|tx| -> CommitmentResult<()> {
            for reservation in &reservations {
                let snapshot = snapshot_for(&snapshots, &reservation.budget_line_id)?;
                let before = AvailabilityCalculator::compute(snapshot, None);

                let mut update = LineTotalsUpdate::from_line(&snapshot.line);
                update.reserved_amount = before.montant_reserve + reservation.amount;
                BudgetLineRepository::update_totals_tx(tx, &update, now)?;
                ReservationRepository::insert_tx(tx, reservation)?;
                MovementRepository::insert_tx(
                    tx,
                    &BudgetMovement::new(
                        &reservation.budget_line_id,
                        MovementType::Reservation,
                        reservation.amount,
                        (before.disponible_net, before.disponible_net - reservation.amount),
                        &request.request_id,
                        actor,
                        now,
                    ),
                )?;
            }
            on_commit(tx, &verdict)
        })?;

        if verdict.is_forced() {
            warn!(
                actor,
                deficit = %verdict.deficit(),
                "reservation beyond disponible_net (forced)"
            );
        }
        info!(
            actor,
            total_amount = %request.total_amount,
            lines = reservations.len(),
            "reservation created"
        );

        Ok(ReserveOutcome {
            verdict,
            reservations,
        })
    }

    // ==========================================
    // 释放 / 转为承诺
    // ==========================================

    /// 释放申请的全部生效预留(没有时不做任何事)
    pub fn release(&self, request_id: &str, actor: &str) -> CommitmentResult<Vec<Reservation>> {
        self.release_with(request_id, actor, |_, _| Ok(()))
    }

    pub fn release_with<F>(
        &self,
        request_id: &str,
        actor: &str,
        on_commit: F,
    ) -> CommitmentResult<Vec<Reservation>>
    where
        F: FnOnce(&Transaction, &[Reservation]) -> CommitmentResult<()>,
    {
        self.close_with(request_id, actor, Closing::Release, on_commit)
    }

    /// 将申请的全部生效预留转入 cumul_engage
    pub fn convert(&self, request_id: &str, actor: &str) -> CommitmentResult<Vec<Reservation>> {
        self.convert_with(request_id, actor, |_, _| Ok(()))
    }

    pub fn convert_with<F>(
        &self,
        request_id: &str,
        actor: &str,
        on_commit: F,
    ) -> CommitmentResult<Vec<Reservation>>
    where
        F: FnOnce(&Transaction, &[Reservation]) -> CommitmentResult<()>,
    {
        self.close_with(request_id, actor, Closing::Convert, on_commit)
    }

    #[instrument(skip(self, on_commit))]
    fn close_with<F>(
        &self,
        request_id: &str,
        actor: &str,
        closing: Closing,
        on_commit: F,
    ) -> CommitmentResult<Vec<Reservation>>
    where
        F: FnOnce(&Transaction, &[Reservation]) -> CommitmentResult<()>,
    {
        let request = self
            .repos
            .commitment_repo
            .find_by_id(request_id)?
            .ok_or_else(|| CommitmentError::not_found("CommitmentRequest", request_id))?;

        let seen: Vec<String> = self
            .repos
            .reservation_repo
            .find_active_by_request(request_id)?
            .into_iter()
            .map(|r| r.budget_line_id)
            .collect();
        let locks = self.locks.acquire(&seen)?;

        // 在锁内重新读取
        let active = self.repos.reservation_repo.find_active_by_request(request_id)?;
        if let Some(stray) = active.iter().find(|r| !locks.covers(&r.budget_line_id)) {
            return Err(CommitmentError::conflict(format!(
                "reservation {} appeared while closing request {}",
                stray.reservation_id, request_id
            )));
        }

        let active_lines: Vec<&str> = active.iter().map(|r| r.budget_line_id.as_str()).collect();
        let snapshots = self.repos.load_snapshots(request.exercice, &active_lines)?;

        let now = Utc::now().naive_utc();
        let closed: Vec<Reservation> = active
            .into_iter()
            .map(|mut reservation| {
                reservation.state = closing.state();
                reservation.closed_at = Some(now);
                reservation
            })
            .collect();

        self.repos.unit_of_work.run(|tx| -> CommitmentResult<()> {
            for reservation in &closed {
                let id = &reservation.reservation_id;
                if !ReservationRepository::close_tx(tx, id, closing.state(), now)? {
                    return Err(CommitmentError::conflict(format!(
                        "reservation {} is no longer active",
                        reservation.reservation_id
                    )));
                }
                let snapshot = snapshot_for(&snapshots, &reservation.budget_line_id)?;
                apply_closing_tx(tx, snapshot, reservation, closing, actor, now)?;
            }
            on_commit(tx, &closed)
        })?;

        let total: Decimal = closed.iter().map(|r| r.amount).sum();
        info!(request_id, actor, ?closing, %total, count = closed.len(), "reservations closed");
        Ok(closed)
    }
}

/// 关闭一笔预留时的预算线合计与流水记录
fn apply_closing_tx(
    tx: &Transaction,
    snapshot: &LedgerSnapshot,
    reservation: &Reservation,
    closing: Closing,
    actor: &str,
    now: NaiveDateTime,
) -> CommitmentResult<()> {
    let before = AvailabilityCalculator::compute(snapshot, None);
    let amount = reservation.amount;

    let mut update = LineTotalsUpdate::from_line(&snapshot.line);
    update.reserved_amount = before.montant_reserve - amount;

    let (movement_type, delta, after) = match closing {
        Closing::Release => (MovementType::Release, -amount, before.disponible_net + amount),
        Closing::Convert => {
            update.cumulative_committed = before.cumul_engage + amount;
            (MovementType::Conversion, amount, before.disponible_net)
        }
    };

    BudgetLineRepository::update_totals_tx(tx, &update, now)?;
    MovementRepository::insert_tx(
        tx,
        &BudgetMovement::new(
            &reservation.budget_line_id,
            movement_type,
            delta,
            (before.disponible_net, after),
            &reservation.request_id,
            actor,
            now,
        ),
    )?;
    Ok(())
}
