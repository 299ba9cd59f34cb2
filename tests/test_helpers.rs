// ==========================================
// 测试辅助
// ==========================================
// 临时文件数据库、预置预算线、标准操作人
// ==========================================
#![allow(dead_code)]

use std::error::Error;

use budget_commitment::app::AppState;
use budget_commitment::domain::budget_line::{BudgetLine, NewBudgetLine};
use budget_commitment::domain::commitment::{Actor, Allocation, CommitmentInput};
use budget_commitment::domain::transfer::NewCreditTransfer;
use budget_commitment::domain::types::Capability;
use rust_decimal::Decimal;
use tempfile::NamedTempFile;

pub const EXERCICE: i32 = 2026;

/// 已初始化表结构的临时数据库文件
///
/// # 返回
/// - NamedTempFile: 测试期间必须保持存活
/// - String: 数据库路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("temp path is not UTF-8")?
        .to_string();

    let conn = budget_commitment::db::open_sqlite_connection(&db_path)?;
    budget_commitment::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 基于全新数据库的完整应用状态
pub struct TestEnv {
    _temp_file: NamedTempFile,
    pub db_path: String,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Self {
        budget_commitment::logging::init_test();
        let (temp_file, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path.clone()).unwrap();
        Self {
            _temp_file: temp_file,
            db_path,
            state,
        }
    }

    /// 以 `initial` 为初始拨款的启用预算线
    pub fn seed_line(&self, code: &str, initial: Decimal) -> BudgetLine {
        self.state
            .budget_api
            .create_budget_line(
                &NewBudgetLine {
                    code: code.to_string(),
                    label: format!("Ligne {}", code),
                    exercice: EXERCICE,
                    initial_allocation: initial,
                },
                &admin(),
            )
            .unwrap()
    }

    /// 已执行的外部追加拨款(无调出方的调拨)
    pub fn top_up(&self, budget_line_id: &str, amount: Decimal) {
        let transfer = self
            .state
            .transfer_api
            .create_transfer(
                &NewCreditTransfer {
                    exercice: EXERCICE,
                    from_budget_line_id: None,
                    to_budget_line_id: budget_line_id.to_string(),
                    amount,
                    motif: "dotation complementaire".to_string(),
                },
                &treasurer(),
            )
            .unwrap();
        self.state
            .transfer_api
            .execute_transfer(&transfer.transfer_id, &treasurer())
            .unwrap();
    }

    /// 先提交再通过,使 `amount` 计入 cumul_engage
    pub fn commit(&self, budget_line_id: &str, amount: Decimal) -> String {
        let submitted = self
            .state
            .commitment_api
            .submit_new(&single(budget_line_id, amount), &agent())
            .unwrap();
        self.state
            .commitment_api
            .decide_commitment(
                &submitted.request_id,
                budget_commitment::api::Decision::Validate,
                None,
                None,
                &controller(),
            )
            .unwrap();
        submitted.request_id
    }
}

pub fn single(budget_line_id: &str, amount: Decimal) -> CommitmentInput {
    CommitmentInput::single(EXERCICE, "Achat fournitures", budget_line_id, amount)
}

pub fn split<S: AsRef<str>>(allocations: &[(S, Decimal)], total: Decimal) -> CommitmentInput {
    CommitmentInput {
        exercice: EXERCICE,
        object: "Imputation multi-lignes".to_string(),
        allocations: allocations
            .iter()
            .map(|(line, amount)| Allocation::new(line.as_ref(), *amount))
            .collect(),
        total_amount: total,
        forced: false,
        justification: None,
    }
}

// ===== 操作人 =====

pub fn agent() -> Actor {
    Actor::new("agent.saisie")
}

pub fn controller() -> Actor {
    Actor::new("controleur").with_capability(Capability::ValidateCommitment)
}

pub fn treasurer() -> Actor {
    Actor::new("tresorier").with_capability(Capability::ExecuteTransfer)
}

pub fn admin() -> Actor {
    Actor::new("admin")
}
