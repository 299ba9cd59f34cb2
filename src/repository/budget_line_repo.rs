// ==========================================
// 预算承诺控制引擎 - 预算线仓储
// ==========================================
// 红线: 不含业务规则,只做数据映射
// 合计只能通过 `update_totals_tx` 写入,
// 并在调用方事务内校验 revision
// ==========================================

use crate::domain::availability::{ActiveReservation, LedgerSnapshot};
use crate::domain::budget_line::{BudgetLine, LineTotalsUpdate};
use crate::domain::types::{ReservationState, TransferStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ledger_reader::LedgerReader;
use crate::repository::row_utils::{
    datetime_to_sql, decimal_to_sql, get_datetime, get_decimal, sum_decimals,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

const LINE_COLUMNS: &str = r#"budget_line_id, code, label, exercice,
    initial_allocation, current_allocation, cumulative_committed, reserved_amount,
    active, revision, created_at, updated_at"#;

// ==========================================
// BudgetLineRepository - 预算线仓储
// ==========================================
pub struct BudgetLineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BudgetLineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 插入新预算线
    ///
    /// # 错误
    /// - `UniqueConstraintViolation`: 编码在本年度已被使用
    pub fn insert(&self, line: &BudgetLine) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO budget_line (
                   budget_line_id, code, label, exercice,
                   initial_allocation, current_allocation, cumulative_committed, reserved_amount,
                   active, revision, created_at, updated_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                line.budget_line_id,
                line.code,
                line.label,
                line.exercice,
                decimal_to_sql(&line.initial_allocation),
                decimal_to_sql(&line.current_allocation),
                decimal_to_sql(&line.cumulative_committed),
                decimal_to_sql(&line.reserved_amount),
                line.active,
                line.revision,
                datetime_to_sql(&line.created_at),
                datetime_to_sql(&line.updated_at),
            ],
        )?;
        Ok(line.budget_line_id.clone())
    }

    /// 预算线合计的比较并设置(事务内)
    ///
    /// # 并发控制
    /// `WHERE revision = expected_revision`,随后 `revision + 1`
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: 读取后该行已被修改
    /// - `NotFound`: 该行不存在
    pub fn update_totals_tx(
        tx: &Transaction,
        update: &LineTotalsUpdate,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows_affected = tx.execute(
            r#"UPDATE budget_line
               SET current_allocation = ?, cumulative_committed = ?, reserved_amount = ?,
                   updated_at = ?, revision = revision + 1
               WHERE budget_line_id = ? AND revision = ?"#,
            params![
                decimal_to_sql(&update.current_allocation),
                decimal_to_sql(&update.cumulative_committed),
                decimal_to_sql(&update.reserved_amount),
                datetime_to_sql(&now),
                update.budget_line_id,
                update.expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            let actual: Option<i32> = tx
                .query_row(
                    "SELECT revision FROM budget_line WHERE budget_line_id = ?",
                    params![update.budget_line_id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    entity: "BudgetLine".to_string(),
                    id: update.budget_line_id.clone(),
                    expected: update.expected_revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "BudgetLine".to_string(),
                    id: update.budget_line_id.clone(),
                },
            });
        }

        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, budget_line_id: &str) -> RepositoryResult<Option<BudgetLine>> {
        let conn = self.get_conn()?;
        find_line(&conn, budget_line_id)
    }

    /// 本年度全部预算线(含停用),按编码排序
    pub fn find_by_exercice(&self, exercice: i32) -> RepositoryResult<Vec<BudgetLine>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM budget_line WHERE exercice = ? ORDER BY code",
            LINE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lines = stmt
            .query_map(params![exercice], map_row)?
            .collect::<Result<Vec<BudgetLine>, _>>()?;
        Ok(lines)
    }

    /// 停用预算线;停用后不再接受分配
    pub fn set_active(&self, budget_line_id: &str, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE budget_line SET active = ?, revision = revision + 1 WHERE budget_line_id = ?",
            params![active, budget_line_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "BudgetLine".to_string(),
                id: budget_line_id.to_string(),
            });
        }
        Ok(())
    }
}

impl LedgerReader for BudgetLineRepository {
    fn load_snapshot(
        &self,
        budget_line_id: &str,
        exercice: i32,
    ) -> RepositoryResult<Option<LedgerSnapshot>> {
        let conn = self.get_conn()?;
        match find_line(&conn, budget_line_id)? {
            Some(line) if line.exercice == exercice => Ok(Some(snapshot_of(&conn, line)?)),
            _ => Ok(None),
        }
    }

    fn load_exercice_snapshots(&self, exercice: i32) -> RepositoryResult<Vec<LedgerSnapshot>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM budget_line WHERE exercice = ? AND active = 1 ORDER BY code",
            LINE_COLUMNS
        );
        let lines = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![exercice], map_row)?
                .collect::<Result<Vec<BudgetLine>, _>>()?;
            rows
        };

        lines
            .into_iter()
            .map(|line| snapshot_of(&conn, line))
            .collect()
    }
}

// ==========================================
// 行映射与快照组装
// ==========================================

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<BudgetLine> {
    Ok(BudgetLine {
        budget_line_id: row.get(0)?,
        code: row.get(1)?,
        label: row.get(2)?,
        exercice: row.get(3)?,
        initial_allocation: get_decimal(row, 4)?,
        current_allocation: get_decimal(row, 5)?,
        cumulative_committed: get_decimal(row, 6)?,
        reserved_amount: get_decimal(row, 7)?,
        active: row.get(8)?,
        revision: row.get(9)?,
        created_at: get_datetime(row, 10)?,
        updated_at: get_datetime(row, 11)?,
    })
}

fn find_line(conn: &Connection, budget_line_id: &str) -> RepositoryResult<Option<BudgetLine>> {
    let sql = format!(
        "SELECT {} FROM budget_line WHERE budget_line_id = ?",
        LINE_COLUMNS
    );
    let line = conn
        .query_row(&sql, params![budget_line_id], map_row)
        .optional()?;
    Ok(line)
}

/// 单条预算线的已执行调入调出与生效预留
fn snapshot_of(conn: &Connection, line: BudgetLine) -> RepositoryResult<LedgerSnapshot> {
    let transfers_in = executed_transfer_sum(conn, &line, "to_budget_line_id")?;
    let transfers_out = executed_transfer_sum(conn, &line, "from_budget_line_id")?;

    let mut stmt = conn.prepare(
        r#"SELECT request_id, amount FROM reservation
           WHERE budget_line_id = ? AND state = ?
           ORDER BY created_at, reservation_id"#,
    )?;
    let active_reservations = stmt
        .query_map(
            params![line.budget_line_id, ReservationState::Active.to_db_str()],
            |row| {
                Ok(ActiveReservation {
                    request_id: row.get(0)?,
                    amount: get_decimal(row, 1)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LedgerSnapshot {
        line,
        transfers_in,
        transfers_out,
        active_reservations,
    })
}

fn executed_transfer_sum(
    conn: &Connection,
    line: &BudgetLine,
    side_column: &str,
) -> RepositoryResult<Decimal> {
    let sql = format!(
        "SELECT amount FROM credit_transfer WHERE {} = ? AND exercice = ? AND status = ?",
        side_column
    );
    let mut stmt = conn.prepare(&sql)?;
    let amounts = stmt
        .query_map(
            params![
                line.budget_line_id,
                line.exercice,
                TransferStatus::Executed.to_db_str()
            ],
            |row| get_decimal(row, 0),
        )?
        .collect::<Result<Vec<Decimal>, _>>()?;
    Ok(sum_decimals(amounts))
}
