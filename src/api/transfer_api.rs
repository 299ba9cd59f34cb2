// ==========================================
// 预算承诺控制引擎 - 调拨 API
// ==========================================
// 同一年度内预算线之间的调拨:
// 创建 (PENDING) -> 执行 (EXECUTED,仅一次) | 取消 (CANCELLED)
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{entity, ActionLog, ActionType};
use crate::domain::commitment::Actor;
use crate::domain::transfer::{CreditTransfer, NewCreditTransfer};
use crate::domain::types::{Capability, TransferStatus};
use crate::engine::{LedgerRepositories, TransferExecutor};
use crate::repository::{ActionLogRepository, TransferRepository};

pub struct TransferApi {
    repos: LedgerRepositories,
    executor: Arc<TransferExecutor>,
}

impl TransferApi {
    pub fn new(repos: LedgerRepositories, executor: Arc<TransferExecutor>) -> Self {
        Self { repos, executor }
    }

    /// 登记待执行的调拨
    ///
    /// # 错误
    /// - `InvalidInput`: 金额非正、事由为空、调出调入为同一
    ///   预算线,或预算线不属于本年度
    /// - `NotFound`: 预算线不存在
    pub fn create_transfer(
        &self,
        input: &NewCreditTransfer,
        actor: &Actor,
    ) -> ApiResult<CreditTransfer> {
        let motif = input.motif.trim();
        if input.amount <= Decimal::ZERO {
            return Err(ApiError::InvalidInput(format!(
                "transfer amount must be positive (got {})",
                input.amount
            )));
        }
        if motif.is_empty() {
            return Err(ApiError::MissingField("motif".to_string()));
        }
        if input.from_budget_line_id.as_deref() == Some(input.to_budget_line_id.as_str()) {
            return Err(ApiError::InvalidInput(
                "source and destination must be different lines".to_string(),
            ));
        }

        let mut sides = vec![input.to_budget_line_id.as_str()];
        if let Some(from) = &input.from_budget_line_id {
            sides.push(from.as_str());
        }
        for line_id in sides {
            let line = self
                .repos
                .line_repo
                .find_by_id(line_id)?
                .ok_or_else(|| ApiError::NotFound(format!("BudgetLine(id={})", line_id)))?;
            if line.exercice != input.exercice {
                return Err(ApiError::InvalidInput(format!(
                    "budget line {} belongs to exercice {}, transfer is for {}",
                    line.code, line.exercice, input.exercice
                )));
            }
        }

        let mut transfer = CreditTransfer {
            transfer_id: uuid::Uuid::new_v4().to_string(),
            code: String::new(),
            exercice: input.exercice,
            from_budget_line_id: input.from_budget_line_id.clone(),
            to_budget_line_id: input.to_budget_line_id.clone(),
            amount: input.amount,
            motif: motif.to_string(),
            status: TransferStatus::Pending,
            requested_by: actor.user_id.clone(),
            requested_at: Utc::now().naive_utc(),
            executed_by: None,
            executed_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancel_reason: None,
        };
        self.repos.transfer_repo.insert_with_next_code(&mut transfer)?;

        let log = ActionLog::new(
            entity::TRANSFER,
            &transfer.transfer_id,
            ActionType::CreateTransfer,
            &actor.user_id,
        )
        .with_payload(json!({
            "code": transfer.code,
            "from": transfer.from_budget_line_id,
            "to": transfer.to_budget_line_id,
            "amount": transfer.amount.to_string(),
        }))
        .with_detail(transfer.motif.clone());
        self.repos.action_log_repo.insert(&log)?;

        info!(
            code = %transfer.code,
            actor = %actor.user_id,
            amount = %transfer.amount,
            "transfer created"
        );
        Ok(transfer)
    }

    /// 执行待执行的调拨(需要 ExecuteTransfer 权限)
    pub fn execute_transfer(&self, transfer_id: &str, actor: &Actor) -> ApiResult<CreditTransfer> {
        if !actor.has(Capability::ExecuteTransfer) {
            return Err(ApiError::PermissionDenied(format!(
                "{} lacks capability {:?}",
                actor.user_id,
                Capability::ExecuteTransfer
            )));
        }

        let executed = self
            .executor
            .execute_with(transfer_id, &actor.user_id, |tx, transfer| {
                let log = ActionLog::new(
                    entity::TRANSFER,
                    &transfer.transfer_id,
                    ActionType::ExecuteTransfer,
                    &actor.user_id,
                )
                .with_payload(json!({
                    "code": transfer.code,
                    "from": transfer.from_budget_line_id,
                    "to": transfer.to_budget_line_id,
                    "amount": transfer.amount.to_string(),
                }));
                ActionLogRepository::insert_tx(tx, &log)?;
                Ok(())
            })?;
        Ok(executed)
    }

    /// 取消待执行的调拨;必须填写原因
    pub fn cancel_transfer(
        &self,
        transfer_id: &str,
        reason: &str,
        actor: &Actor,
    ) -> ApiResult<CreditTransfer> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::MissingField("reason".to_string()));
        }

        let transfer = self.get_transfer(transfer_id)?;
        if !transfer.is_pending() {
            return Err(ApiError::InvalidStateTransition {
                from: transfer.status.to_string(),
                to: TransferStatus::Cancelled.to_string(),
            });
        }

        let now = Utc::now().naive_utc();
        let log = ActionLog::new(
            entity::TRANSFER,
            transfer_id,
            ActionType::CancelTransfer,
            &actor.user_id,
        )
        .with_payload(json!({ "code": transfer.code }))
        .with_detail(reason);

        self.repos.unit_of_work.run(|tx| -> ApiResult<()> {
            let by = &actor.user_id;
            if !TransferRepository::mark_cancelled_tx(tx, transfer_id, by, reason, now)? {
                return Err(ApiError::ConcurrencyConflict(format!(
                    "transfer {} changed while cancelling",
                    transfer.code
                )));
            }
            ActionLogRepository::insert_tx(tx, &log)?;
            Ok(())
        })?;

        info!(code = %transfer.code, actor = %actor.user_id, "transfer cancelled");
        self.get_transfer(transfer_id)
    }

    pub fn get_transfer(&self, transfer_id: &str) -> ApiResult<CreditTransfer> {
        self.repos
            .transfer_repo
            .find_by_id(transfer_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CreditTransfer(id={})", transfer_id)))
    }

    pub fn list_transfers(
        &self,
        exercice: i32,
        status: Option<TransferStatus>,
    ) -> ApiResult<Vec<CreditTransfer>> {
        Ok(self.repos.transfer_repo.list(exercice, status)?)
    }

    pub fn list_transfers_by_line(&self, budget_line_id: &str) -> ApiResult<Vec<CreditTransfer>> {
        Ok(self.repos.transfer_repo.list_by_line(budget_line_id)?)
    }
}
