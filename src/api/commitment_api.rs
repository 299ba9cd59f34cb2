// ==========================================
// 预算承诺控制引擎 - 承诺 API
// ==========================================
// 额度查询、校验预览与承诺工作流。
// 每次工作流写入都在其预留效果所在的账本事务中执行,
// 审计记录一并写入。
// ==========================================

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{entity, ActionLog, ActionType};
use crate::domain::availability::AvailabilityBreakdown;
use crate::domain::commitment::{
    Actor, CommitmentInput, CommitmentRequest, Reservation, StatusChange,
};
use crate::domain::types::CommitmentStatus;
use crate::engine::{
    AllocationCheck, AvailabilityCalculator, CommitmentDecision, CommitmentResult,
    CommitmentWorkflow, LedgerRepositories, ReservationEffect, ReservationManager,
    ValidationVerdict, WorkflowAction,
};
use crate::repository::{ActionLogRepository, CommitmentRepository};

// ==========================================
// 数据传输对象
// ==========================================

/// 校验预览结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub decision: CommitmentDecision,
    pub deficit: Decimal,
    pub reason: Option<String>,
    pub lines: Vec<AllocationCheck>,
}

impl From<ValidationVerdict> for ValidationResult {
    fn from(verdict: ValidationVerdict) -> Self {
        let reason = match &verdict.decision {
            CommitmentDecision::Sufficient => None,
            CommitmentDecision::Forced { deficit, .. } => Some(format!(
                "forced override: exceeds disponible_net by {}",
                deficit
            )),
            CommitmentDecision::Insufficient { deficit } => Some(format!(
                "insufficient funds: deficit {}; resubmit as forced with a justification",
                deficit
            )),
        };
        Self {
            ok: verdict.is_admissible(),
            deficit: verdict.deficit(),
            decision: verdict.decision,
            reason,
            lines: verdict.checks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResult {
    pub request_id: String,
    pub status: CommitmentStatus,
    pub decision: CommitmentDecision,
    pub reservations: Vec<Reservation>,
}

/// 审核人对已提交申请的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Validate,
    Reject,
    Defer,
}

impl Decision {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "VALIDATE" => Some(Decision::Validate),
            "REJECT" => Some(Decision::Reject),
            "DEFER" => Some(Decision::Defer),
            _ => None,
        }
    }

    fn into_action(self, motif: Option<String>, date_reprise: Option<NaiveDate>) -> WorkflowAction {
        match self {
            Decision::Validate => WorkflowAction::Validate,
            Decision::Reject => WorkflowAction::Reject { motif },
            Decision::Defer => WorkflowAction::Defer { motif, date_reprise },
        }
    }
}

/// 申请及其预留与审计轨迹
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentDetail {
    pub request: CommitmentRequest,
    pub reservations: Vec<Reservation>,
    pub history: Vec<ActionLog>,
}

// ==========================================
// CommitmentApi - 承诺 API
// ==========================================
pub struct CommitmentApi {
    repos: LedgerRepositories,
    reservations: Arc<ReservationManager>,
}

impl CommitmentApi {
    pub fn new(repos: LedgerRepositories, reservations: Arc<ReservationManager>) -> Self {
        Self {
            repos,
            reservations,
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 单条预算线的实时可用额度
    pub fn get_availability(
        &self,
        budget_line_id: &str,
        exercice: i32,
    ) -> ApiResult<AvailabilityBreakdown> {
        let snapshot = self
            .repos
            .ledger
            .load_snapshot(budget_line_id, exercice)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "BudgetLine(id={}) in exercice {}",
                    budget_line_id, exercice
                ))
            })?;
        Ok(AvailabilityCalculator::compute(&snapshot, None))
    }

    /// 校验预览,不写入任何数据
    ///
    /// 额度不足时返回 `ok = false` 及缺口金额;
    /// 格式错误的申请直接返回错误。
    pub fn validate_commitment(&self, input: &CommitmentInput) -> ApiResult<ValidationResult> {
        let preview = CommitmentRequest::draft(
            uuid::Uuid::new_v4().to_string(),
            input,
            "",
            Utc::now().naive_utc(),
        );
        let verdict = self.assess(&preview)?;
        debug!(decision = ?verdict.decision, "validation preview");
        Ok(verdict.into())
    }

    pub fn get_commitment(&self, request_id: &str) -> ApiResult<CommitmentDetail> {
        let request = self.load_request(request_id)?;
        let reservations = self.repos.reservation_repo.find_by_request(request_id)?;
        let history = self
            .repos
            .action_log_repo
            .find_by_entity(entity::COMMITMENT, request_id)?;
        Ok(CommitmentDetail {
            request,
            reservations,
            history,
        })
    }

    pub fn list_commitments(
        &self,
        exercice: i32,
        status: Option<CommitmentStatus>,
    ) -> ApiResult<Vec<CommitmentRequest>> {
        Ok(self.repos.commitment_repo.list(exercice, status)?)
    }

    // ==========================================
    // 草稿
    // ==========================================

    /// 保存草稿;草稿不占用预留
    pub fn create_draft(
        &self,
        input: &CommitmentInput,
        actor: &Actor,
    ) -> ApiResult<CommitmentRequest> {
        let request = CommitmentRequest::draft(
            uuid::Uuid::new_v4().to_string(),
            input,
            &actor.user_id,
            Utc::now().naive_utc(),
        );
        if request.object.is_empty() {
            return Err(ApiError::InvalidInput("object is required".to_string()));
        }
        self.reservations.validator().check_structure(&request)?;

        let log = ActionLog::new(
            entity::COMMITMENT,
            &request.request_id,
            ActionType::CreateDraft,
            &actor.user_id,
        )
        .with_payload(json!({
            "exercice": request.exercice,
            "total_amount": request.total_amount.to_string(),
            "lines": request.line_ids(),
            "forced": request.forced,
        }));

        self.repos.unit_of_work.run(|tx| -> ApiResult<()> {
            CommitmentRepository::insert_tx(tx, &request)?;
            ActionLogRepository::insert_tx(tx, &log)?;
            Ok(())
        })?;

        info!(request_id = %request.request_id, actor = %actor.user_id, "draft created");
        Ok(request)
    }

    // ==========================================
    // 工作流
    // ==========================================

    /// Draft -> Submitted,预留每一项分配
    pub fn submit_commitment(&self, request_id: &str, actor: &Actor) -> ApiResult<SubmitResult> {
        let request = self.load_request(request_id)?;
        let plan = CommitmentWorkflow::plan(
            &request,
            &WorkflowAction::Submit,
            actor,
            Utc::now().naive_utc(),
        )?;

        let outcome = self
            .reservations
            .reserve_with(&request, &actor.user_id, |tx, verdict| {
                let mut change = plan.change.clone();
                change.verdict_snapshot_json = Some(serde_json::to_string(verdict)?);
                record_transition(tx, &change, ActionType::SubmitCommitment, None)?;

                if let CommitmentDecision::Forced {
                    justification,
                    deficit,
                } = &verdict.decision
                {
                    let log = ActionLog::new(
                        entity::COMMITMENT,
                        &request.request_id,
                        ActionType::ForcedOverride,
                        &actor.user_id,
                    )
                    .with_payload(json!({
                        "deficit": deficit.to_string(),
                        "total_amount": request.total_amount.to_string(),
                        "lines": verdict.checks,
                    }))
                    .with_detail(justification.clone());
                    ActionLogRepository::insert_tx(tx, &log)?;
                }
                Ok(())
            })?;

        if outcome.verdict.is_forced() {
            warn!(
                request_id,
                actor = %actor.user_id,
                deficit = %outcome.verdict.deficit(),
                "commitment submitted with forced override"
            );
        }
        info!(request_id, actor = %actor.user_id, "commitment submitted");

        Ok(SubmitResult {
            request_id: request.request_id,
            status: CommitmentStatus::Submitted,
            decision: outcome.verdict.decision,
            reservations: outcome.reservations,
        })
    }

    /// 一次调用完成建草稿与提交
    ///
    /// 提交被拒时保留草稿
    pub fn submit_new(&self, input: &CommitmentInput, actor: &Actor) -> ApiResult<SubmitResult> {
        let draft = self.create_draft(input, actor)?;
        self.submit_commitment(&draft.request_id, actor)
    }

    /// 审核人对已提交申请的决定
    pub fn decide_commitment(
        &self,
        request_id: &str,
        decision: Decision,
        motif: Option<String>,
        date_reprise: Option<NaiveDate>,
        actor: &Actor,
    ) -> ApiResult<CommitmentRequest> {
        self.apply(request_id, decision.into_action(motif, date_reprise), actor)
    }

    /// Deferred -> Submitted;预留一直保留
    pub fn resume_commitment(
        &self,
        request_id: &str,
        actor: &Actor,
    ) -> ApiResult<CommitmentRequest> {
        self.apply(request_id, WorkflowAction::Resume, actor)
    }

    /// 撤回尚未决定的申请
    pub fn cancel_commitment(
        &self,
        request_id: &str,
        motif: Option<String>,
        actor: &Actor,
    ) -> ApiResult<CommitmentRequest> {
        self.apply(request_id, WorkflowAction::Cancel { motif }, actor)
    }

    /// 除提交外的所有状态迁移
    fn apply(
        &self,
        request_id: &str,
        action: WorkflowAction,
        actor: &Actor,
    ) -> ApiResult<CommitmentRequest> {
        let request = self.load_request(request_id)?;
        let plan = CommitmentWorkflow::plan(&request, &action, actor, Utc::now().naive_utc())?;
        let action_type = action_type_of(&action);
        let change = &plan.change;

        match plan.effect {
            ReservationEffect::Keep => {
                self.repos.unit_of_work.run(|tx| -> ApiResult<()> {
                    record_transition(tx, change, action_type, None)?;
                    Ok(())
                })?;
            }
            ReservationEffect::Release => {
                self.reservations
                    .release_with(request_id, &actor.user_id, |tx, closed| {
                        record_transition(tx, change, action_type, Some(closed))
                    })?;
            }
            ReservationEffect::Convert => {
                self.reservations
                    .convert_with(request_id, &actor.user_id, |tx, closed| {
                        record_transition(tx, change, action_type, Some(closed))
                    })?;
            }
            ReservationEffect::Reserve => {
                // 只有提交会预留
                return Err(ApiError::InternalError(format!(
                    "{} cannot create reservations",
                    action.name()
                )));
            }
        }

        info!(
            request_id,
            actor = %actor.user_id,
            from = %change.from,
            to = %change.to,
            "commitment transition"
        );
        self.load_request(request_id)
    }

    // ==========================================
    // 辅助函数
    // ==========================================

    fn load_request(&self, request_id: &str) -> ApiResult<CommitmentRequest> {
        self.repos
            .commitment_repo
            .find_by_id(request_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CommitmentRequest(id={})", request_id)))
    }

    fn assess(&self, request: &CommitmentRequest) -> ApiResult<ValidationVerdict> {
        let validator = self.reservations.validator();
        validator.check_structure(request)?;
        let snapshots = self
            .repos
            .load_snapshots(request.exercice, &request.line_ids())?;
        Ok(validator.assess(request, &snapshots)?)
    }
}

/// 状态变更 + 审计记录,在调用方事务内执行
fn record_transition(
    tx: &Transaction,
    change: &StatusChange,
    action_type: ActionType,
    closed: Option<&[Reservation]>,
) -> CommitmentResult<()> {
    CommitmentRepository::apply_status_change_tx(tx, change)?;

    let mut payload = json!({
        "from": change.from,
        "to": change.to,
        "motif": change.motif,
        "date_reprise": change.date_reprise,
    });
    if let Some(closed) = closed {
        let total: Decimal = closed.iter().map(|r| r.amount).sum();
        payload["reservations_closed"] = json!(closed.len());
        payload["amount"] = json!(total.to_string());
    }

    let mut log = ActionLog::new(entity::COMMITMENT, &change.request_id, action_type, &change.actor)
        .with_payload(payload);
    if let Some(motif) = &change.motif {
        log = log.with_detail(motif.clone());
    }
    ActionLogRepository::insert_tx(tx, &log)?;
    Ok(())
}

fn action_type_of(action: &WorkflowAction) -> ActionType {
    match action {
        WorkflowAction::Submit => ActionType::SubmitCommitment,
        WorkflowAction::Validate => ActionType::ValidateCommitment,
        WorkflowAction::Reject { .. } => ActionType::RejectCommitment,
        WorkflowAction::Defer { .. } => ActionType::DeferCommitment,
        WorkflowAction::Resume => ActionType::ResumeCommitment,
        WorkflowAction::Cancel { .. } => ActionType::CancelCommitment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decision_parsing() {
        assert_eq!(Decision::from_str("validate"), Some(Decision::Validate));
        assert_eq!(Decision::from_str(" DEFER "), Some(Decision::Defer));
        assert_eq!(Decision::from_str("approve"), None);
    }

    #[test]
    fn test_decision_maps_to_workflow_action() {
        let action = Decision::Defer.into_action(Some("attente devis".to_string()), None);
        assert_eq!(action.target(), CommitmentStatus::Deferred);
        assert_eq!(action.motif(), Some("attente devis"));
        assert_eq!(Decision::Validate.into_action(None, None), WorkflowAction::Validate);
    }

    #[test]
    fn test_validation_result_from_insufficient_verdict() {
        let verdict = ValidationVerdict {
            request_id: "R1".to_string(),
            decision: CommitmentDecision::Insufficient { deficit: dec!(50000) },
            checks: vec![],
        };
        let result = ValidationResult::from(verdict);
        assert!(!result.ok);
        assert_eq!(result.deficit, dec!(50000));
        assert!(result.reason.unwrap().contains("50000"));
    }

    #[test]
    fn test_validation_result_from_sufficient_verdict() {
        let verdict = ValidationVerdict {
            request_id: "R1".to_string(),
            decision: CommitmentDecision::Sufficient,
            checks: vec![],
        };
        let result = ValidationResult::from(verdict);
        assert!(result.ok);
        assert_eq!(result.deficit, Decimal::ZERO);
        assert!(result.reason.is_none());
    }
}
