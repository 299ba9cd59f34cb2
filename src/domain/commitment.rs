// ==========================================
// 预算承诺控制引擎 - 承诺申请 (imputation)
// ==========================================
// 申请在进入终态前归创建人独占。
// 预留归属于申请。
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::{Capability, CommitmentStatus, ReservationState};

// ==========================================
// Actor - 操作用户(由身份服务提供)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub capabilities: Vec<Capability>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

// ==========================================
// Allocation - (budget_line_id, amount)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub budget_line_id: String,
    pub amount: Decimal,
}

impl Allocation {
    pub fn new(budget_line_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            budget_line_id: budget_line_id.into(),
            amount,
        }
    }
}

// ==========================================
// CommitmentInput - 调用方提供的申请内容
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentInput {
    pub exercice: i32,
    pub object: String,
    pub allocations: Vec<Allocation>,
    pub total_amount: Decimal, // 申报总额,必须等于分配合计
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub justification: Option<String>,
}

impl CommitmentInput {
    /// 单预算线简写: 申报总额 = 分配金额
    pub fn single(exercice: i32, object: &str, budget_line_id: &str, amount: Decimal) -> Self {
        Self {
            exercice,
            object: object.to_string(),
            allocations: vec![Allocation::new(budget_line_id, amount)],
            total_amount: amount,
            forced: false,
            justification: None,
        }
    }

    pub fn forced_with(mut self, justification: &str) -> Self {
        self.forced = true;
        self.justification = Some(justification.to_string());
        self
    }
}

// ==========================================
// CommitmentRequest - 承诺申请
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitmentRequest {
    pub request_id: String,
    pub exercice: i32,
    pub object: String,
    pub allocations: Vec<Allocation>,
    pub total_amount: Decimal,
    pub forced: bool,
    pub justification: Option<String>,
    pub status: CommitmentStatus,

    // ===== 决定字段 =====
    pub motif: Option<String>, // 当前 REJECTED / DEFERRED / CANCELLED 状态的原因
    pub date_reprise: Option<NaiveDate>, // 由最近一次暂缓写入
    pub verdict_snapshot_json: Option<String>, // 提交时附带的校验结论

    // ===== 审计 =====
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<NaiveDateTime>,
    pub deferred_by: Option<String>, // 最近一次暂缓,恢复后保留
    pub deferred_at: Option<NaiveDateTime>,
    pub decided_by: Option<String>, // 通过 / 驳回 / 取消
    pub decided_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,

    pub revision: i32, // 乐观锁版本号
}

impl CommitmentRequest {
    /// 按调用方输入构建未保存的草稿
    pub fn draft(
        request_id: String,
        input: &CommitmentInput,
        created_by: &str,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            request_id,
            exercice: input.exercice,
            object: input.object.trim().to_string(),
            allocations: input.allocations.clone(),
            total_amount: input.total_amount,
            forced: input.forced,
            justification: input
                .justification
                .as_ref()
                .filter(|j| !j.trim().is_empty())
                .cloned(),
            status: CommitmentStatus::Draft,
            motif: None,
            date_reprise: None,
            verdict_snapshot_json: None,
            created_by: created_by.to_string(),
            created_at: now,
            submitted_by: None,
            submitted_at: None,
            deferred_by: None,
            deferred_at: None,
            decided_by: None,
            decided_at: None,
            updated_at: now,
            revision: 0,
        }
    }

    /// 分配金额合计(精确)
    pub fn allocated_sum(&self) -> Decimal {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    pub fn line_ids(&self) -> Vec<String> {
        self.allocations
            .iter()
            .map(|a| a.budget_line_id.clone())
            .collect()
    }
}

// ==========================================
// StatusChange - 一次落库的工作流迁移
// ==========================================
// 带 revision 校验执行,与预留效果(如有)
// 处于同一事务
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub request_id: String,
    pub expected_revision: i32,
    pub from: CommitmentStatus,
    pub to: CommitmentStatus,
    pub actor: String,
    pub at: NaiveDateTime,
    pub motif: Option<String>,
    pub date_reprise: Option<NaiveDate>,
    pub verdict_snapshot_json: Option<String>,
}

// ==========================================
// Reservation - 预留
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub request_id: String,
    pub budget_line_id: String,
    pub amount: Decimal,
    pub state: ReservationState,
    pub created_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>, // 释放或转为承诺
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.state == ReservationState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_draft_trims_blank_justification() {
        let input = CommitmentInput::single(2026, "  Fournitures  ", "BL1", d("100"))
            .forced_with("   ");
        let now = chrono::Utc::now().naive_utc();
        let draft = CommitmentRequest::draft("R1".to_string(), &input, "u1", now);

        assert_eq!(draft.object, "Fournitures");
        assert!(draft.forced);
        assert_eq!(draft.justification, None);
        assert_eq!(draft.status, CommitmentStatus::Draft);

        // 非空白文本按原样保留
        let padded = input.forced_with(" urgent ");
        let draft = CommitmentRequest::draft("R2".to_string(), &padded, "u1", now);
        assert_eq!(draft.justification.as_deref(), Some(" urgent "));
    }

    #[test]
    fn test_allocated_sum_is_exact() {
        let input = CommitmentInput {
            exercice: 2026,
            object: "Split".to_string(),
            allocations: vec![
                Allocation::new("BL1", d("0.1")),
                Allocation::new("BL2", d("0.2")),
            ],
            total_amount: d("0.3"),
            forced: false,
            justification: None,
        };
        let now = chrono::Utc::now().naive_utc();
        let draft = CommitmentRequest::draft("R1".to_string(), &input, "u1", now);
        assert_eq!(draft.allocated_sum(), d("0.3"));
    }

    #[test]
    fn test_actor_capabilities() {
        let actor = Actor::new("ctrl").with_capability(Capability::ValidateCommitment);
        assert!(actor.has(Capability::ValidateCommitment));
        assert!(!actor.has(Capability::ExecuteTransfer));
    }
}
