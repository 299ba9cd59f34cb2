// ==========================================
// 预算承诺控制引擎 - 调拨 (virement)
// ==========================================
// 生命周期: PENDING -> EXECUTED(恰好一次,不可变)
//           PENDING -> CANCELLED
// ==========================================

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::TransferStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransfer {
    pub transfer_id: String,
    pub code: String, // VIR-{exercice}-{seq}
    pub exercice: i32,
    pub from_budget_line_id: Option<String>, // None = 外部追加拨款
    pub to_budget_line_id: String,
    pub amount: Decimal,
    pub motif: String,
    pub status: TransferStatus,

    // ===== 审计 =====
    pub requested_by: String,
    pub requested_at: NaiveDateTime,
    pub executed_by: Option<String>,
    pub executed_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancel_reason: Option<String>,
}

/// 创建调拨的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCreditTransfer {
    pub exercice: i32,
    pub from_budget_line_id: Option<String>,
    pub to_budget_line_id: String,
    pub amount: Decimal,
    pub motif: String,
}

impl CreditTransfer {
    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }

    /// 执行涉及的预算线,调出方在前
    pub fn line_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(2);
        if let Some(from) = &self.from_budget_line_id {
            ids.push(from.clone());
        }
        ids.push(self.to_budget_line_id.clone());
        ids
    }
}
