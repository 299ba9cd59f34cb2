// ==========================================
// 预算承诺控制引擎 - 预算 API
// ==========================================
// 预算线、按年度汇总、变动流水与审计日志
// ==========================================

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{entity, ActionLog, ActionType};
use crate::domain::availability::{AvailabilityBreakdown, BudgetSummary, LineAlert};
use crate::domain::budget_line::{BudgetLine, NewBudgetLine};
use crate::domain::commitment::Actor;
use crate::domain::movement::BudgetMovement;
use crate::engine::{AvailabilityCalculator, LedgerRepositories};

pub struct BudgetApi {
    repos: LedgerRepositories,
    alert_threshold_pct: Decimal,
}

impl BudgetApi {
    pub fn new(repos: LedgerRepositories, alert_threshold_pct: Decimal) -> Self {
        Self {
            repos,
            alert_threshold_pct,
        }
    }

    // ==========================================
    // 预算线
    // ==========================================

    /// 按初始拨款开立预算线
    ///
    /// # 错误
    /// - `InvalidInput`: 编码为空、拨款为负
    /// - `BusinessRuleViolation`: 编码在本年度已被使用
    pub fn create_budget_line(
        &self,
        input: &NewBudgetLine,
        actor: &Actor,
    ) -> ApiResult<BudgetLine> {
        if input.code.trim().is_empty() {
            return Err(ApiError::InvalidInput("budget line code is required".to_string()));
        }
        if input.initial_allocation < Decimal::ZERO {
            return Err(ApiError::InvalidInput(format!(
                "initial allocation cannot be negative (got {})",
                input.initial_allocation
            )));
        }

        let line = BudgetLine::from_new(
            uuid::Uuid::new_v4().to_string(),
            input,
            Utc::now().naive_utc(),
        );
        self.repos.line_repo.insert(&line)?;

        let log = ActionLog::new(
            entity::BUDGET_LINE,
            &line.budget_line_id,
            ActionType::CreateBudgetLine,
            &actor.user_id,
        )
        .with_payload(json!({
            "code": line.code,
            "exercice": line.exercice,
            "initial_allocation": line.initial_allocation.to_string(),
        }));
        self.repos.action_log_repo.insert(&log)?;

        info!(
            code = %line.code,
            exercice = line.exercice,
            actor = %actor.user_id,
            "budget line created"
        );
        Ok(line)
    }

    /// 停用的预算线不再接受新的分配,也不计入汇总
    pub fn set_line_active(
        &self,
        budget_line_id: &str,
        active: bool,
        actor: &Actor,
    ) -> ApiResult<()> {
        self.repos.line_repo.set_active(budget_line_id, active)?;

        let log = ActionLog::new(
            entity::BUDGET_LINE,
            budget_line_id,
            ActionType::SetBudgetLineActive,
            &actor.user_id,
        )
        .with_payload(json!({ "active": active }));
        self.repos.action_log_repo.insert(&log)?;

        info!(budget_line_id, active, actor = %actor.user_id, "budget line activation changed");
        Ok(())
    }

    pub fn list_budget_lines(&self, exercice: i32) -> ApiResult<Vec<BudgetLine>> {
        Ok(self.repos.line_repo.find_by_exercice(exercice)?)
    }

    // ==========================================
    // 可用额度
    // ==========================================

    /// 本年度每条启用预算线的额度明细
    pub fn list_line_availabilities(&self, exercice: i32) -> ApiResult<Vec<AvailabilityBreakdown>> {
        let snapshots = self.repos.ledger.load_exercice_snapshots(exercice)?;
        Ok(snapshots
            .iter()
            .map(|snapshot| AvailabilityCalculator::compute(snapshot, None))
            .collect())
    }

    pub fn get_budget_summary(&self, exercice: i32) -> ApiResult<BudgetSummary> {
        let breakdowns = self.list_line_availabilities(exercice)?;
        Ok(AvailabilityCalculator::summarize(
            exercice,
            &breakdowns,
            self.alert_threshold_pct,
        ))
    }

    /// 达到或超过预警阈值的启用预算线,按严重程度降序
    pub fn list_budget_alerts(&self, exercice: i32) -> ApiResult<Vec<LineAlert>> {
        let mut alerts: Vec<LineAlert> = self
            .list_line_availabilities(exercice)?
            .iter()
            .filter_map(|b| AvailabilityCalculator::alert_for(b, self.alert_threshold_pct))
            .collect();
        alerts.sort_by(|a, b| {
            b.niveau
                .cmp(&a.niveau)
                .then_with(|| b.taux_consommation.cmp(&a.taux_consommation))
                .then_with(|| a.code.cmp(&b.code))
        });

        if !alerts.is_empty() {
            warn!(exercice, count = alerts.len(), "budget lines above alert threshold");
        }
        Ok(alerts)
    }

    // ==========================================
    // 流水
    // ==========================================

    /// 单条预算线的变动流水,按时间升序
    pub fn list_movements(&self, budget_line_id: &str) -> ApiResult<Vec<BudgetMovement>> {
        Ok(self.repos.movement_repo.find_by_line(budget_line_id)?)
    }

    /// 单个实体的审计轨迹,按时间升序
    pub fn list_audit_trail(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> ApiResult<Vec<ActionLog>> {
        Ok(self
            .repos
            .action_log_repo
            .find_by_entity(entity_type, entity_id)?)
    }

    pub fn list_recent_actions(&self, limit: i32) -> ApiResult<Vec<ActionLog>> {
        Ok(self.repos.action_log_repo.find_recent(limit)?)
    }

    /// 强制入账记录,按时间降序(理由在 `detail` 中)
    pub fn list_forced_overrides(&self, limit: i32) -> ApiResult<Vec<ActionLog>> {
        Ok(self
            .repos
            .action_log_repo
            .find_by_action_type(ActionType::ForcedOverride.as_str(), limit)?)
    }
}
