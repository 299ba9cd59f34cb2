// ==========================================
// 预算承诺控制引擎 - 承诺工作流状态机
// ==========================================
// 迁移表(表外一律 InvalidTransition)
//
//   DRAFT     --submit-->   SUBMITTED   reserve
//   DRAFT     --cancel-->   CANCELLED
//   SUBMITTED --validate--> VALIDATED   convert   (ValidateCommitment 权限)
//   SUBMITTED --reject-->   REJECTED    release   (motif)
//   SUBMITTED --defer-->    DEFERRED    keep      (motif,可选 date_reprise)
//   SUBMITTED --cancel-->   CANCELLED   release   (motif)
//   DEFERRED  --resume-->   SUBMITTED   keep
//   DEFERRED  --cancel-->   CANCELLED   release   (motif)
//
// 申请的预留如何处理只由此表决定。
// ==========================================

use crate::domain::commitment::{Actor, CommitmentRequest, StatusChange};
use crate::domain::types::{Capability, CommitmentStatus};
use crate::engine::error::{CommitmentError, CommitmentResult};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// WorkflowAction - 工作流动作
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    Submit,
    Validate,
    Reject {
        motif: Option<String>,
    },
    Defer {
        motif: Option<String>,
        date_reprise: Option<NaiveDate>,
    },
    Resume,
    Cancel {
        motif: Option<String>,
    },
}

impl WorkflowAction {
    /// 动作成功后到达的状态
    pub fn target(&self) -> CommitmentStatus {
        match self {
            WorkflowAction::Submit | WorkflowAction::Resume => CommitmentStatus::Submitted,
            WorkflowAction::Validate => CommitmentStatus::Validated,
            WorkflowAction::Reject { .. } => CommitmentStatus::Rejected,
            WorkflowAction::Defer { .. } => CommitmentStatus::Deferred,
            WorkflowAction::Cancel { .. } => CommitmentStatus::Cancelled,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowAction::Submit => "submit",
            WorkflowAction::Validate => "validate",
            WorkflowAction::Reject { .. } => "reject",
            WorkflowAction::Defer { .. } => "defer",
            WorkflowAction::Resume => "resume",
            WorkflowAction::Cancel { .. } => "cancel",
        }
    }

    /// 去除首尾空白后非空的事由
    pub fn motif(&self) -> Option<&str> {
        match self {
            WorkflowAction::Reject { motif }
            | WorkflowAction::Defer { motif, .. }
            | WorkflowAction::Cancel { motif } => {
                motif.as_deref().map(str::trim).filter(|m| !m.is_empty())
            }
            _ => None,
        }
    }

    pub fn date_reprise(&self) -> Option<NaiveDate> {
        match self {
            WorkflowAction::Defer { date_reprise, .. } => *date_reprise,
            _ => None,
        }
    }

    fn requires_motif(&self) -> bool {
        matches!(
            self,
            WorkflowAction::Reject { .. }
                | WorkflowAction::Defer { .. }
                | WorkflowAction::Cancel { .. }
        )
    }

    fn required_capability(&self) -> Option<Capability> {
        match self {
            WorkflowAction::Validate => Some(Capability::ValidateCommitment),
            _ => None,
        }
    }
}

// ==========================================
// ReservationEffect - 预留效果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationEffect {
    Reserve,
    Keep,
    Release,
    Convert,
}

/// 已校验、可落库的迁移
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub change: StatusChange,
    pub effect: ReservationEffect,
}

// ==========================================
// CommitmentWorkflow - 带守卫的分发器
// ==========================================
pub struct CommitmentWorkflow;

impl CommitmentWorkflow {
    /// 查迁移表
    ///
    /// # 错误
    /// - `InvalidTransition`: (from, action) 不在表中
    /// - `MissingField`: 该动作需要事由
    pub fn transition(
        from: CommitmentStatus,
        action: &WorkflowAction,
    ) -> CommitmentResult<CommitmentStatus> {
        Self::effect_of(from, action)?;
        if action.requires_motif() && action.motif().is_none() {
            return Err(CommitmentError::MissingField {
                field: "motif".to_string(),
            });
        }
        Ok(action.target())
    }

    /// 该迁移对预留的效果
    pub fn effect_of(
        from: CommitmentStatus,
        action: &WorkflowAction,
    ) -> CommitmentResult<ReservationEffect> {
        use CommitmentStatus::*;

        let effect = match (from, action) {
            (Draft, WorkflowAction::Submit) => ReservationEffect::Reserve,
            (Draft, WorkflowAction::Cancel { .. }) => ReservationEffect::Keep,
            (Submitted, WorkflowAction::Validate) => ReservationEffect::Convert,
            (Submitted, WorkflowAction::Reject { .. }) => ReservationEffect::Release,
            (Submitted, WorkflowAction::Defer { .. }) => ReservationEffect::Keep,
            (Submitted, WorkflowAction::Cancel { .. }) => ReservationEffect::Release,
            (Deferred, WorkflowAction::Resume) => ReservationEffect::Keep,
            (Deferred, WorkflowAction::Cancel { .. }) => ReservationEffect::Release,
            _ => {
                return Err(CommitmentError::InvalidTransition {
                    from,
                    to: action.target(),
                })
            }
        };
        Ok(effect)
    }

    /// 权限关口
    pub fn authorize(action: &WorkflowAction, actor: &Actor) -> CommitmentResult<()> {
        match action.required_capability() {
            Some(capability) if !actor.has(capability) => Err(CommitmentError::MissingCapability {
                actor: actor.user_id.clone(),
                capability,
            }),
            _ => Ok(()),
        }
    }

    /// 对单个申请的单个动作做完整检查
    ///
    /// 顺序: 迁移表、必填字段、权限
    pub fn plan(
        request: &CommitmentRequest,
        action: &WorkflowAction,
        actor: &Actor,
        at: NaiveDateTime,
    ) -> CommitmentResult<TransitionPlan> {
        let to = Self::transition(request.status, action)?;
        let effect = Self::effect_of(request.status, action)?;
        Self::authorize(action, actor)?;

        Ok(TransitionPlan {
            change: StatusChange {
                request_id: request.request_id.clone(),
                expected_revision: request.revision,
                from: request.status,
                to,
                actor: actor.user_id.clone(),
                at,
                motif: action.motif().map(str::to_string),
                date_reprise: action.date_reprise(),
                verdict_snapshot_json: None,
            },
            effect,
        })
    }
}
