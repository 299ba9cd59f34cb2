// ==========================================
// 预算承诺控制引擎 - 承诺申请校验器
// ==========================================
// 校验顺序:
// 1) 结构(分配、金额、重复预算线)    -> InvalidRequest
// 2) 分配合计 == 申报总额              -> ValidationMismatch
// 3) 预算线存在、启用、同一年度        -> NotFound / InvalidRequest
// 4) 逐项分配对照 disponible_net 判断是否足额
// 5) 强制入账策略(forced + 理由)      -> MissingJustification
// 无副作用。相同输入,相同结论。
// ==========================================

use crate::config::commitment_policy::CommitmentPolicy;
use crate::domain::availability::LedgerSnapshot;
use crate::domain::commitment::CommitmentRequest;
use crate::engine::availability::AvailabilityCalculator;
use crate::engine::error::{CommitmentError, CommitmentResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// CommitmentDecision - 以带标签变体表示强制入账路径
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitmentDecision {
    Sufficient,
    Forced {
        justification: String,
        deficit: Decimal,
    },
    Insufficient {
        deficit: Decimal,
    },
}

impl CommitmentDecision {
    pub fn deficit(&self) -> Decimal {
        match self {
            CommitmentDecision::Sufficient => Decimal::ZERO,
            CommitmentDecision::Forced { deficit, .. } => *deficit,
            CommitmentDecision::Insufficient { deficit } => *deficit,
        }
    }
}

/// 逐项分配的足额检查
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationCheck {
    pub budget_line_id: String,
    pub code: String,
    pub amount: Decimal,
    pub disponible_net: Decimal,
    pub sufficient: bool,
    pub deficit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub request_id: String,
    pub decision: CommitmentDecision,
    pub checks: Vec<AllocationCheck>,
}

impl ValidationVerdict {
    pub fn is_admissible(&self) -> bool {
        !matches!(self.decision, CommitmentDecision::Insufficient { .. })
    }

    pub fn is_forced(&self) -> bool {
        matches!(self.decision, CommitmentDecision::Forced { .. })
    }

    pub fn deficit(&self) -> Decimal {
        self.decision.deficit()
    }

    /// 将 Insufficient 结论转为 `InsufficientFunds`
    pub fn ensure_admissible(self) -> CommitmentResult<Self> {
        match self.decision {
            CommitmentDecision::Insufficient { deficit } => Err(CommitmentError::InsufficientFunds {
                deficit,
                shortfalls: self.checks.into_iter().filter(|c| !c.sufficient).collect(),
            }),
            _ => Ok(self),
        }
    }
}

// ==========================================
// CommitmentValidator - 承诺申请校验器
// ==========================================
#[derive(Debug, Clone)]
pub struct CommitmentValidator {
    justification_min_length: usize,
}

impl CommitmentValidator {
    pub fn new(justification_min_length: usize) -> Self {
        Self {
            justification_min_length,
        }
    }

    pub fn from_policy(policy: &CommitmentPolicy) -> Self {
        Self::new(policy.justification_min_length)
    }

    pub fn justification_min_length(&self) -> usize {
        self.justification_min_length
    }

    /// 无需账本数据的结构检查
    pub fn check_structure(&self, request: &CommitmentRequest) -> CommitmentResult<()> {
        if request.allocations.is_empty() {
            return Err(CommitmentError::InvalidRequest(
                "at least one allocation is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for allocation in &request.allocations {
            if allocation.budget_line_id.trim().is_empty() {
                return Err(CommitmentError::InvalidRequest(
                    "allocation without budget line".to_string(),
                ));
            }
            if allocation.amount <= Decimal::ZERO {
                return Err(CommitmentError::InvalidRequest(format!(
                    "allocation amount must be positive (line {}: {})",
                    allocation.budget_line_id, allocation.amount
                )));
            }
            if !seen.insert(allocation.budget_line_id.as_str()) {
                return Err(CommitmentError::InvalidRequest(format!(
                    "budget line {} appears more than once",
                    allocation.budget_line_id
                )));
            }
        }
        Ok(())
    }

    /// 完整评估;Insufficient 结论作为返回值而非错误
    pub fn assess(
        &self,
        request: &CommitmentRequest,
        snapshots: &[LedgerSnapshot],
    ) -> CommitmentResult<ValidationVerdict> {
        self.check_structure(request)?;

        let allocated = request.allocated_sum();
        if allocated != request.total_amount {
            return Err(CommitmentError::ValidationMismatch {
                declared: request.total_amount,
                allocated,
            });
        }

        let mut checks = Vec::with_capacity(request.allocations.len());
        for allocation in &request.allocations {
            let snapshot = snapshots
                .iter()
                .find(|s| s.line.budget_line_id == allocation.budget_line_id)
                .ok_or_else(|| {
                    CommitmentError::not_found("BudgetLine", &allocation.budget_line_id)
                })?;

            if snapshot.line.exercice != request.exercice {
                return Err(CommitmentError::InvalidRequest(format!(
                    "budget line {} belongs to exercice {}, request is for {}",
                    snapshot.line.code, snapshot.line.exercice, request.exercice
                )));
            }
            if !snapshot.line.active {
                return Err(CommitmentError::InvalidRequest(format!(
                    "budget line {} is inactive",
                    snapshot.line.code
                )));
            }

            let breakdown = AvailabilityCalculator::compute(snapshot, Some(&request.request_id));
            checks.push(AllocationCheck {
                budget_line_id: allocation.budget_line_id.clone(),
                code: breakdown.code.clone(),
                amount: allocation.amount,
                disponible_net: breakdown.disponible_net,
                sufficient: breakdown.covers(allocation.amount),
                deficit: breakdown.deficit_for(allocation.amount),
            });
        }

        let deficit: Decimal = checks.iter().map(|c| c.deficit).sum();
        let decision = if checks.iter().all(|c| c.sufficient) {
            CommitmentDecision::Sufficient
        } else if request.forced {
            // 按原始长度计算,空白文本视为未填写
            let justification = request
                .justification
                .as_deref()
                .filter(|j| !j.trim().is_empty())
                .unwrap_or("");
            let actual = justification.chars().count();
            if actual < self.justification_min_length {
                return Err(CommitmentError::MissingJustification {
                    min_length: self.justification_min_length,
                    actual,
                });
            }
            CommitmentDecision::Forced {
                justification: justification.to_string(),
                deficit,
            }
        } else {
            CommitmentDecision::Insufficient { deficit }
        };

        Ok(ValidationVerdict {
            request_id: request.request_id.clone(),
            decision,
            checks,
        })
    }

    /// 必须可受理的评估(预留关口)
    pub fn validate(
        &self,
        request: &CommitmentRequest,
        snapshots: &[LedgerSnapshot],
    ) -> CommitmentResult<ValidationVerdict> {
        self.assess(request, snapshots)?.ensure_admissible()
    }
}

impl Default for CommitmentValidator {
    fn default() -> Self {
        Self::from_policy(&CommitmentPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::budget_line::{BudgetLine, NewBudgetLine};
    use crate::domain::commitment::{Allocation, CommitmentInput};
    use rust_decimal_macros::dec;

    fn snapshot(id: &str, initial: Decimal, cumul: Decimal) -> LedgerSnapshot {
        let input = NewBudgetLine {
            code: format!("C-{}", id),
            label: id.to_string(),
            exercice: 2026,
            initial_allocation: initial,
        };
        let mut line = BudgetLine::from_new(id.to_string(), &input, chrono::Utc::now().naive_utc());
        line.cumulative_committed = cumul;
        LedgerSnapshot {
            line,
            transfers_in: Decimal::ZERO,
            transfers_out: Decimal::ZERO,
            active_reservations: Vec::new(),
        }
    }

    fn request(input: &CommitmentInput) -> CommitmentRequest {
        CommitmentRequest::draft("R1".to_string(), input, "u1", chrono::Utc::now().naive_utc())
    }

    #[test]
    fn test_sufficient_single_line() {
        let snaps = vec![snapshot("BL1", dec!(1000), dec!(0))];
        let req = request(&CommitmentInput::single(2026, "Achat", "BL1", dec!(1000)));

        let verdict = CommitmentValidator::default().validate(&req, &snaps).unwrap();
        assert_eq!(verdict.decision, CommitmentDecision::Sufficient);
        assert_eq!(verdict.deficit(), dec!(0));
    }

    #[test]
    fn test_insufficient_is_blocking_with_deficit() {
        let snaps = vec![snapshot("BL1", dec!(1000), dec!(300))];
        let req = request(&CommitmentInput::single(2026, "Achat", "BL1", dec!(750)));

        let validator = CommitmentValidator::default();
        let verdict = validator.assess(&req, &snaps).unwrap();
        assert_eq!(verdict.decision, CommitmentDecision::Insufficient { deficit: dec!(50) });

        match validator.validate(&req, &snaps).unwrap_err() {
            CommitmentError::InsufficientFunds { deficit, shortfalls } => {
                assert_eq!(deficit, dec!(50));
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].disponible_net, dec!(700));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_split_deficit_is_summed_over_insufficient_lines() {
        let snaps = vec![
            snapshot("BL1", dec!(100), dec!(0)),
            snapshot("BL2", dec!(100), dec!(0)),
            snapshot("BL3", dec!(100), dec!(0)),
        ];
        let input = CommitmentInput {
            exercice: 2026,
            object: "Split".to_string(),
            allocations: vec![
                Allocation::new("BL1", dec!(120)),
                Allocation::new("BL2", dec!(50)),
                Allocation::new("BL3", dec!(130.5)),
            ],
            total_amount: dec!(300.5),
            forced: false,
            justification: None,
        };
        let verdict = CommitmentValidator::default().assess(&request(&input), &snaps).unwrap();
        assert_eq!(verdict.deficit(), dec!(50.5));
        assert_eq!(verdict.checks.iter().filter(|c| !c.sufficient).count(), 2);
    }

    #[test]
    fn test_split_mismatch_wins_over_sufficiency() {
        let snaps = vec![
            snapshot("BL1", dec!(1000), dec!(0)),
            snapshot("BL2", dec!(1000), dec!(0)),
        ];
        let input = CommitmentInput {
            exercice: 2026,
            object: "Split".to_string(),
            allocations: vec![Allocation::new("BL1", dec!(0.1)), Allocation::new("BL2", dec!(0.2))],
            total_amount: dec!(0.31),
            forced: false,
            justification: None,
        };
        let err = CommitmentValidator::default().assess(&request(&input), &snaps).unwrap_err();
        assert!(matches!(
            err,
            CommitmentError::ValidationMismatch { declared, allocated }
                if declared == dec!(0.31) && allocated == dec!(0.3)
        ));
    }

    #[test]
    fn test_forced_justification_boundary() {
        let snaps = vec![snapshot("BL1", dec!(100), dec!(0))];
        let validator = CommitmentValidator::default();

        let nine = request(
            &CommitmentInput::single(2026, "Achat", "BL1", dec!(150)).forced_with("123456789"),
        );
        assert!(matches!(
            validator.assess(&nine, &snaps).unwrap_err(),
            CommitmentError::MissingJustification { min_length: 10, actual: 9 }
        ));

        let ten = request(
            &CommitmentInput::single(2026, "Achat", "BL1", dec!(150)).forced_with("1234567890"),
        );
        let verdict = validator.validate(&ten, &snaps).unwrap();
        assert_eq!(
            verdict.decision,
            CommitmentDecision::Forced {
                justification: "1234567890".to_string(),
                deficit: dec!(50)
            }
        );
    }

    #[test]
    fn test_justification_counts_raw_length() {
        let snaps = vec![snapshot("BL1", dec!(100), dec!(0))];
        let validator = CommitmentValidator::default();
        let forced = |text: &str| {
            request(&CommitmentInput::single(2026, "Achat", "BL1", dec!(150)).forced_with(text))
        };

        // 8 个字符加一个尾随空格
        assert!(matches!(
            validator.assess(&forced("12345678 "), &snaps).unwrap_err(),
            CommitmentError::MissingJustification { min_length: 10, actual: 9 }
        ));

        // 9 个字符加一个尾随空格
        let verdict = validator.assess(&forced("123456789 "), &snaps).unwrap();
        assert_eq!(
            verdict.decision,
            CommitmentDecision::Forced {
                justification: "123456789 ".to_string(),
                deficit: dec!(50)
            }
        );

        assert!(matches!(
            validator.assess(&forced("            "), &snaps).unwrap_err(),
            CommitmentError::MissingJustification { actual: 0, .. }
        ));
    }

    #[test]
    fn test_forced_flag_without_need_is_plain_sufficient() {
        let snaps = vec![snapshot("BL1", dec!(100), dec!(0))];
        let mut input = CommitmentInput::single(2026, "Achat", "BL1", dec!(10));
        input.forced = true;
        let verdict = CommitmentValidator::default().validate(&request(&input), &snaps).unwrap();
        assert_eq!(verdict.decision, CommitmentDecision::Sufficient);
    }

    #[test]
    fn test_structural_errors() {
        let snaps = vec![snapshot("BL1", dec!(100), dec!(0))];
        let validator = CommitmentValidator::default();

        let mut empty = CommitmentInput::single(2026, "Achat", "BL1", dec!(10));
        empty.allocations.clear();
        assert!(matches!(
            validator.assess(&request(&empty), &snaps),
            Err(CommitmentError::InvalidRequest(_))
        ));

        let zero = CommitmentInput::single(2026, "Achat", "BL1", dec!(0));
        assert!(matches!(
            validator.assess(&request(&zero), &snaps),
            Err(CommitmentError::InvalidRequest(_))
        ));

        let mut dup = CommitmentInput::single(2026, "Achat", "BL1", dec!(10));
        dup.allocations.push(Allocation::new("BL1", dec!(5)));
        dup.total_amount = dec!(15);
        assert!(matches!(
            validator.assess(&request(&dup), &snaps),
            Err(CommitmentError::InvalidRequest(_))
        ));

        let unknown = CommitmentInput::single(2026, "Achat", "BL9", dec!(10));
        assert!(matches!(
            validator.assess(&request(&unknown), &snaps),
            Err(CommitmentError::NotFound { .. })
        ));
    }

    #[test]
    fn test_inactive_line_is_rejected() {
        let mut snap = snapshot("BL1", dec!(100), dec!(0));
        snap.line.active = false;
        let req = request(&CommitmentInput::single(2026, "Achat", "BL1", dec!(10)));
        assert!(matches!(
            CommitmentValidator::default().assess(&req, &[snap]),
            Err(CommitmentError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_assess_is_idempotent() {
        let snaps = vec![snapshot("BL1", dec!(100), dec!(60))];
        let req = request(&CommitmentInput::single(2026, "Achat", "BL1", dec!(50)));
        let validator = CommitmentValidator::default();
        assert_eq!(
            validator.assess(&req, &snaps).unwrap(),
            validator.assess(&req, &snaps).unwrap()
        );
    }
}
