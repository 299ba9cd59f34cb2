// ==========================================
// 预算承诺控制引擎 - 可用额度模型
// ==========================================
// LedgerSnapshot: 账本读取器的返回(单条预算线,单个年度)
// AvailabilityBreakdown: 实时计算,不落库,不缓存
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::budget_line::BudgetLine;

// ==========================================
// ActiveReservation - 预算线上一笔生效中的预留
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveReservation {
    pub request_id: String,
    pub amount: Decimal,
}

// ==========================================
// LedgerSnapshot - 单条预算线的权威数据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub line: BudgetLine,
    pub transfers_in: Decimal,  // 已执行调入合计
    pub transfers_out: Decimal, // 已执行调出合计
    pub active_reservations: Vec<ActiveReservation>,
}

impl LedgerSnapshot {
    /// 生效预留合计,可排除某一申请自身的预留
    pub fn reserved_excluding(&self, exclude_request_id: Option<&str>) -> Decimal {
        self.active_reservations
            .iter()
            .filter(|r| Some(r.request_id.as_str()) != exclude_request_id)
            .map(|r| r.amount)
            .sum()
    }
}

// ==========================================
// AvailabilityBreakdown - 额度明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityBreakdown {
    pub budget_line_id: String,
    pub code: String,
    pub exercice: i32,

    pub dotation_initiale: Decimal,
    pub virements_recus: Decimal,
    pub virements_emis: Decimal,
    pub dotation_actuelle: Decimal, // initiale + recus - emis
    pub cumul_engage: Decimal,
    pub disponible_brut: Decimal, // actuelle - cumul_engage
    pub montant_reserve: Decimal,
    pub disponible_net: Decimal, // brut - reserve,可能为负

    pub taux_engagement: Decimal, // 占 dotation_actuelle 的百分比,仅用于展示
}

impl AvailabilityBreakdown {
    /// 判断额度是否足以覆盖该金额
    pub fn covers(&self, amount: Decimal) -> bool {
        amount <= self.disponible_net
    }

    /// 该金额的缺口(足额时为零)
    pub fn deficit_for(&self, amount: Decimal) -> Decimal {
        if self.covers(amount) {
            Decimal::ZERO
        } else {
            amount - self.disponible_net
        }
    }

    pub fn is_overdrawn(&self) -> bool {
        self.disponible_net < Decimal::ZERO
    }
}

// ==========================================
// BudgetSummary - 单个年度全部启用预算线
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub exercice: i32,
    pub total_dotation_initiale: Decimal,
    pub total_dotation_actuelle: Decimal,
    pub total_engage: Decimal,
    pub total_reserve: Decimal,
    pub total_disponible: Decimal,
    pub taux_global: Decimal,
    pub nb_lignes: usize,
    pub nb_lignes_depassement: usize, // disponible_net < 0 的预算线数
    pub nb_lignes_alerte: usize,      // 触发消耗预警的预算线数
}

// ==========================================
// 消耗预警
// ==========================================

/// 消耗达到预警阈值的预算线的严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Warning,  // >= 阈值
    Critical, // >= 95 %
    Blocking, // >= 100 %
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAlert {
    pub budget_line_id: String,
    pub code: String,
    pub exercice: i32,
    pub niveau: AlertLevel,
    pub seuil_pct: Decimal,
    pub taux_consommation: Decimal, // cumul_engage / dotation_actuelle,保留 2 位小数
    pub dotation_actuelle: Decimal,
    pub cumul_engage: Decimal,
    pub disponible_brut: Decimal,
}
