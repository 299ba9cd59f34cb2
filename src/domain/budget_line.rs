// ==========================================
// 预算承诺控制引擎 - 预算线
// ==========================================
// 不变式: current_allocation = initial_allocation + transfers_in - transfers_out
// current_allocation 是冗余的展示字段,不作为
// 权威数据读回
// ==========================================

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// BudgetLine - 预算线 (ligne budgetaire)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetLine {
    pub budget_line_id: String,
    pub code: String,
    pub label: String,
    pub exercice: i32, // 财政年度

    // ===== 账本合计 =====
    pub initial_allocation: Decimal,   // 初始拨款
    pub current_allocation: Decimal,   // 冗余字段,调拨执行时刷新
    pub cumulative_committed: Decimal, // 累计承诺(已确认)
    pub reserved_amount: Decimal,      // 预留金额(生效预留)

    pub active: bool,
    pub revision: i32, // 乐观锁版本号
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// 创建预算线的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudgetLine {
    pub code: String,
    pub label: String,
    pub exercice: i32,
    pub initial_allocation: Decimal,
}

impl BudgetLine {
    /// 按输入构建新预算线,合计清零
    pub fn from_new(budget_line_id: String, input: &NewBudgetLine, now: NaiveDateTime) -> Self {
        Self {
            budget_line_id,
            code: input.code.trim().to_string(),
            label: input.label.trim().to_string(),
            exercice: input.exercice,
            initial_allocation: input.initial_allocation,
            current_allocation: input.initial_allocation,
            cumulative_committed: Decimal::ZERO,
            reserved_amount: Decimal::ZERO,
            active: true,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// LineTotalsUpdate - 预算线行的比较并设置
// ==========================================
// 在事务内执行;revision 已变化时失败
#[derive(Debug, Clone)]
pub struct LineTotalsUpdate {
    pub budget_line_id: String,
    pub expected_revision: i32,
    pub current_allocation: Decimal,
    pub cumulative_committed: Decimal,
    pub reserved_amount: Decimal,
}

impl LineTotalsUpdate {
    /// 以预算线当前值为起点
    pub fn from_line(line: &BudgetLine) -> Self {
        Self {
            budget_line_id: line.budget_line_id.clone(),
            expected_revision: line.revision,
            current_allocation: line.current_allocation,
            cumulative_committed: line.cumulative_committed,
            reserved_amount: line.reserved_amount,
        }
    }
}
