// ==========================================
// 预算承诺控制引擎 - 审计日志模型
// ==========================================
// 红线: 每个写操作都记录操作人。
// 强制入账必须携带理由。
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 审计记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub entity_type: String, // BUDGET_LINE / COMMITMENT / TRANSFER
    pub entity_id: String,
    pub action_type: String, // 以字符串存储
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateBudgetLine,
    SetBudgetLineActive,
    CreateDraft,
    SubmitCommitment,
    ForcedOverride, // 超出 disponible_net 的提交
    ValidateCommitment,
    RejectCommitment,
    DeferCommitment,
    ResumeCommitment,
    CancelCommitment,
    CreateTransfer,
    ExecuteTransfer,
    CancelTransfer,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateBudgetLine => "CreateBudgetLine",
            ActionType::SetBudgetLineActive => "SetBudgetLineActive",
            ActionType::CreateDraft => "CreateDraft",
            ActionType::SubmitCommitment => "SubmitCommitment",
            ActionType::ForcedOverride => "ForcedOverride",
            ActionType::ValidateCommitment => "ValidateCommitment",
            ActionType::RejectCommitment => "RejectCommitment",
            ActionType::DeferCommitment => "DeferCommitment",
            ActionType::ResumeCommitment => "ResumeCommitment",
            ActionType::CancelCommitment => "CancelCommitment",
            ActionType::CreateTransfer => "CreateTransfer",
            ActionType::ExecuteTransfer => "ExecuteTransfer",
            ActionType::CancelTransfer => "CancelTransfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CreateBudgetLine" => Some(ActionType::CreateBudgetLine),
            "SetBudgetLineActive" => Some(ActionType::SetBudgetLineActive),
            "CreateDraft" => Some(ActionType::CreateDraft),
            "SubmitCommitment" => Some(ActionType::SubmitCommitment),
            "ForcedOverride" => Some(ActionType::ForcedOverride),
            "ValidateCommitment" => Some(ActionType::ValidateCommitment),
            "RejectCommitment" => Some(ActionType::RejectCommitment),
            "DeferCommitment" => Some(ActionType::DeferCommitment),
            "ResumeCommitment" => Some(ActionType::ResumeCommitment),
            "CancelCommitment" => Some(ActionType::CancelCommitment),
            "CreateTransfer" => Some(ActionType::CreateTransfer),
            "ExecuteTransfer" => Some(ActionType::ExecuteTransfer),
            "CancelTransfer" => Some(ActionType::CancelTransfer),
            _ => None,
        }
    }
}

/// 审计记录引用的实体类型
pub mod entity {
    pub const BUDGET_LINE: &str = "BUDGET_LINE";
    pub const COMMITMENT: &str = "COMMITMENT";
    pub const TRANSFER: &str = "TRANSFER";
}

impl ActionLog {
    /// 创建审计记录,时间戳为当前时间
    pub fn new(entity_type: &str, entity_id: &str, action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_string_roundtrip() {
        for t in [
            ActionType::SubmitCommitment,
            ActionType::ForcedOverride,
            ActionType::ExecuteTransfer,
        ] {
            assert_eq!(ActionType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(ActionType::from_str("Recalc"), None);
    }

    #[test]
    fn test_builder_sets_payload_and_detail() {
        let log = ActionLog::new(entity::COMMITMENT, "R1", ActionType::ForcedOverride, "u1")
            .with_payload(serde_json::json!({ "deficit": "50000" }))
            .with_detail("depassement justifie");

        assert_eq!(log.action_type, "ForcedOverride");
        assert_eq!(log.entity_type, "COMMITMENT");
        assert!(log.payload_json.is_some());
        assert_eq!(log.detail.as_deref(), Some("depassement justifie"));
    }
}
