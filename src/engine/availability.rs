// ==========================================
// 预算承诺控制引擎 - 可用额度计算器
// ==========================================
// 基于 LedgerSnapshot 的纯计算: 无 I/O,无缓存,不会失败。
// disponible_net 可能为负;这是超支信号,
// 不是错误。
// ==========================================

use crate::domain::availability::{
    AlertLevel, AvailabilityBreakdown, BudgetSummary, LedgerSnapshot, LineAlert,
};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

pub struct AvailabilityCalculator;

impl AvailabilityCalculator {
    /// 单条预算线的可用额度
    ///
    /// `exclude_request_id`: 忽略该申请自身的生效预留
    pub fn compute(
        snapshot: &LedgerSnapshot,
        exclude_request_id: Option<&str>,
    ) -> AvailabilityBreakdown {
        let line = &snapshot.line;

        let dotation_actuelle =
            line.initial_allocation + snapshot.transfers_in - snapshot.transfers_out;
        let cumul_engage = line.cumulative_committed;
        let disponible_brut = dotation_actuelle - cumul_engage;
        let montant_reserve = snapshot.reserved_excluding(exclude_request_id);
        let disponible_net = disponible_brut - montant_reserve;

        debug!(
            budget_line_id = %line.budget_line_id,
            %dotation_actuelle,
            %cumul_engage,
            %montant_reserve,
            %disponible_net,
            "availability computed"
        );

        AvailabilityBreakdown {
            budget_line_id: line.budget_line_id.clone(),
            code: line.code.clone(),
            exercice: line.exercice,
            dotation_initiale: line.initial_allocation,
            virements_recus: snapshot.transfers_in,
            virements_emis: snapshot.transfers_out,
            dotation_actuelle,
            cumul_engage,
            disponible_brut,
            montant_reserve,
            disponible_net,
            taux_engagement: percentage(cumul_engage, dotation_actuelle),
        }
    }

    /// 汇总一个年度的全部预算线
    pub fn summarize(
        exercice: i32,
        breakdowns: &[AvailabilityBreakdown],
        alert_threshold_pct: Decimal,
    ) -> BudgetSummary {
        let total_dotation_initiale: Decimal = breakdowns.iter().map(|b| b.dotation_initiale).sum();
        let total_dotation_actuelle: Decimal = breakdowns.iter().map(|b| b.dotation_actuelle).sum();
        let total_engage: Decimal = breakdowns.iter().map(|b| b.cumul_engage).sum();
        let total_reserve: Decimal = breakdowns.iter().map(|b| b.montant_reserve).sum();
        let total_disponible: Decimal = breakdowns.iter().map(|b| b.disponible_net).sum();

        BudgetSummary {
            exercice,
            total_dotation_initiale,
            total_dotation_actuelle,
            total_engage,
            total_reserve,
            total_disponible,
            taux_global: percentage(total_engage, total_dotation_actuelle),
            nb_lignes: breakdowns.len(),
            nb_lignes_depassement: breakdowns.iter().filter(|b| b.is_overdrawn()).count(),
            nb_lignes_alerte: breakdowns
                .iter()
                .filter(|b| Self::alert_for(b, alert_threshold_pct).is_some())
                .count(),
        }
    }

    /// 消耗率对应的预警级别;低于阈值时为 None
    pub fn alert_level(taux_pct: Decimal, alert_threshold_pct: Decimal) -> Option<AlertLevel> {
        if taux_pct < alert_threshold_pct {
            None
        } else if taux_pct >= Decimal::ONE_HUNDRED {
            Some(AlertLevel::Blocking)
        } else if taux_pct >= CRITICAL_RATE_PCT {
            Some(AlertLevel::Critical)
        } else {
            Some(AlertLevel::Warning)
        }
    }

    /// 单条预算线的消耗预警
    ///
    /// 消耗率 = 已承诺 / 当前拨款,不含预留。
    /// 无拨款的预算线不预警。
    pub fn alert_for(
        breakdown: &AvailabilityBreakdown,
        alert_threshold_pct: Decimal,
    ) -> Option<LineAlert> {
        if breakdown.dotation_actuelle <= Decimal::ZERO {
            return None;
        }
        let taux = breakdown
            .cumul_engage
            .checked_div(breakdown.dotation_actuelle)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))?;
        let niveau = Self::alert_level(taux, alert_threshold_pct)?;

        Some(LineAlert {
            budget_line_id: breakdown.budget_line_id.clone(),
            code: breakdown.code.clone(),
            exercice: breakdown.exercice,
            niveau,
            seuil_pct: alert_threshold_pct,
            taux_consommation: round_pct(taux),
            dotation_actuelle: breakdown.dotation_actuelle,
            cumul_engage: breakdown.cumul_engage,
            disponible_brut: breakdown.disponible_brut,
        })
    }
}

const CRITICAL_RATE_PCT: Decimal = Decimal::from_parts(95, 0, 0, false, 0);

/// part / whole * 100,保留 2 位小数;whole <= 0 时为 0
fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(round_pct)
        .unwrap_or(Decimal::ZERO)
}

fn round_pct(pct: Decimal) -> Decimal {
    pct.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
