// ==========================================
// 预算承诺控制引擎 - 预算变动流水
// ==========================================
// 预算线合计每变动一次记一行
// ==========================================

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::types::MovementType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetMovement {
    pub movement_id: String,
    pub budget_line_id: String,
    pub movement_type: MovementType,
    pub delta: Decimal, // movement_type 所指额度桶的带符号变动
    pub disponible_avant: Decimal,
    pub disponible_apres: Decimal,
    pub ref_id: String, // request_id 或 transfer_id
    pub actor: String,
    pub created_at: NaiveDateTime,
}

impl BudgetMovement {
    /// `disponible` 为变动前后的 disponible_net
    pub fn new(
        budget_line_id: &str,
        movement_type: MovementType,
        delta: Decimal,
        disponible: (Decimal, Decimal),
        ref_id: &str,
        actor: &str,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            movement_id: uuid::Uuid::new_v4().to_string(),
            budget_line_id: budget_line_id.to_string(),
            movement_type,
            delta,
            disponible_avant: disponible.0,
            disponible_apres: disponible.1,
            ref_id: ref_id.to_string(),
            actor: actor.to_string(),
            created_at,
        }
    }
}
