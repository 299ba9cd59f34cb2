// ==========================================
// 预算承诺控制引擎 - 调拨仓储
// ==========================================
// 状态变更由 `WHERE status = 'PENDING'` 保护:
// 调拨最多执行或取消一次
// ==========================================

use crate::domain::transfer::CreditTransfer;
use crate::domain::types::TransferStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    datetime_to_sql, decimal_to_sql, get_datetime, get_decimal, get_enum, get_opt_datetime,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT transfer_id, code, exercice, from_budget_line_id, to_budget_line_id,
           amount, motif, status, requested_by, requested_at,
           executed_by, executed_at, cancelled_by, cancelled_at, cancel_reason
    FROM credit_transfer
"#;

pub struct TransferRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransferRepository {
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

    /// 分配下一个 `VIR-{exercice}-{seq:04}` 编码并插入
    ///
    /// 编码分配与插入在同一事务中
    pub fn insert_with_next_code(&self, transfer: &mut CreditTransfer) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM credit_transfer WHERE exercice = ?",
            params![transfer.exercice],
            |row| row.get(0),
        )?;
        transfer.code = format!("VIR-{}-{:04}", transfer.exercice, count + 1);

        tx.execute(
            r#"INSERT INTO credit_transfer (
                   transfer_id, code, exercice, from_budget_line_id, to_budget_line_id,
                   amount, motif, status, requested_by, requested_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                transfer.transfer_id,
                transfer.code,
                transfer.exercice,
                transfer.from_budget_line_id,
                transfer.to_budget_line_id,
                decimal_to_sql(&transfer.amount),
                transfer.motif,
                transfer.status.to_db_str(),
                transfer.requested_by,
                datetime_to_sql(&transfer.requested_at),
            ],
        )?;

        tx.commit()?;
        Ok(transfer.code.clone())
    }

    /// PENDING -> EXECUTED
    ///
    /// # 返回
    /// - Ok(false): 调拨已不处于待执行状态
    pub fn mark_executed_tx(
        tx: &Transaction,
        transfer_id: &str,
        actor: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let rows = tx.execute(
            r#"UPDATE credit_transfer
               SET status = ?, executed_by = ?, executed_at = ?
               WHERE transfer_id = ? AND status = ?"#,
            params![
                TransferStatus::Executed.to_db_str(),
                actor,
                datetime_to_sql(&at),
                transfer_id,
                TransferStatus::Pending.to_db_str(),
            ],
        )?;
        Ok(rows == 1)
    }

    /// PENDING -> CANCELLED
    ///
    /// # 返回
    /// - Ok(false): 调拨已不处于待执行状态
    pub fn mark_cancelled_tx(
        tx: &Transaction,
        transfer_id: &str,
        actor: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let rows = tx.execute(
            r#"UPDATE credit_transfer
               SET status = ?, cancelled_by = ?, cancelled_at = ?, cancel_reason = ?
               WHERE transfer_id = ? AND status = ?"#,
            params![
                TransferStatus::Cancelled.to_db_str(),
                actor,
                datetime_to_sql(&at),
                reason,
                transfer_id,
                TransferStatus::Pending.to_db_str(),
            ],
        )?;
        Ok(rows == 1)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, transfer_id: &str) -> RepositoryResult<Option<CreditTransfer>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE transfer_id = ?", SELECT_COLUMNS);
        let transfer = conn
            .query_row(&sql, params![transfer_id], map_row)
            .optional()?;
        Ok(transfer)
    }

    /// 本年度调拨,可按状态过滤,按时间降序
    pub fn list(
        &self,
        exercice: i32,
        status: Option<TransferStatus>,
    ) -> RepositoryResult<Vec<CreditTransfer>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE exercice = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY requested_at DESC, code DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let transfers = stmt
            .query_map(params![exercice, status.map(|s| s.to_db_str())], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transfers)
    }

    /// 涉及某条预算线(任一方)的调拨,按时间降序
    pub fn list_by_line(&self, budget_line_id: &str) -> RepositoryResult<Vec<CreditTransfer>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE from_budget_line_id = ?1 OR to_budget_line_id = ?1 \
             ORDER BY requested_at DESC, code DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let transfers = stmt
            .query_map(params![budget_line_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transfers)
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CreditTransfer> {
    Ok(CreditTransfer {
        transfer_id: row.get(0)?,
        code: row.get(1)?,
        exercice: row.get(2)?,
        from_budget_line_id: row.get(3)?,
        to_budget_line_id: row.get(4)?,
        amount: get_decimal(row, 5)?,
        motif: row.get(6)?,
        status: get_enum(row, 7, TransferStatus::from_str)?,
        requested_by: row.get(8)?,
        requested_at: get_datetime(row, 9)?,
        executed_by: row.get(10)?,
        executed_at: get_opt_datetime(row, 11)?,
        cancelled_by: row.get(12)?,
        cancelled_at: get_opt_datetime(row, 13)?,
        cancel_reason: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::budget_line::{BudgetLine, NewBudgetLine};
    use crate::repository::budget_line_repo::BudgetLineRepository;
    use rust_decimal_macros::dec;

    fn setup() -> (Arc<Mutex<Connection>>, TransferRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let lines = BudgetLineRepository::new(conn.clone());
        for (id, code) in [("BL1", "6011"), ("BL2", "6012")] {
            let input = NewBudgetLine {
                code: code.to_string(),
                label: code.to_string(),
                exercice: 2026,
                initial_allocation: dec!(1000),
            };
            lines
                .insert(&BudgetLine::from_new(
                    id.to_string(),
                    &input,
                    chrono::Utc::now().naive_utc(),
                ))
                .unwrap();
        }

        (conn.clone(), TransferRepository::new(conn))
    }

    fn pending(id: &str) -> CreditTransfer {
        CreditTransfer {
            transfer_id: id.to_string(),
            code: String::new(),
            exercice: 2026,
            from_budget_line_id: Some("BL1".to_string()),
            to_budget_line_id: "BL2".to_string(),
            amount: dec!(150.50),
            motif: "Reallocation".to_string(),
            status: TransferStatus::Pending,
            requested_by: "u1".to_string(),
            requested_at: chrono::Utc::now().naive_utc(),
            executed_by: None,
            executed_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancel_reason: None,
        }
    }

    #[test]
    fn test_codes_are_sequential_per_exercice() {
        let (_, repo) = setup();
        let mut t1 = pending("T1");
        let mut t2 = pending("T2");
        assert_eq!(repo.insert_with_next_code(&mut t1).unwrap(), "VIR-2026-0001");
        assert_eq!(repo.insert_with_next_code(&mut t2).unwrap(), "VIR-2026-0002");

        let found = repo.find_by_id("T2").unwrap().unwrap();
        assert_eq!(found.code, "VIR-2026-0002");
        assert_eq!(found.amount, dec!(150.50));
        assert!(found.is_pending());
    }

    #[test]
    fn test_execute_happens_once() {
        let (conn, repo) = setup();
        repo.insert_with_next_code(&mut pending("T1")).unwrap();

        let mut guard = conn.lock().unwrap();
        let tx = guard.transaction().unwrap();
        let now = chrono::Utc::now().naive_utc();
        assert!(TransferRepository::mark_executed_tx(&tx, "T1", "ctrl", now).unwrap());
        assert!(!TransferRepository::mark_executed_tx(&tx, "T1", "ctrl", now).unwrap());
        assert!(!TransferRepository::mark_cancelled_tx(&tx, "T1", "ctrl", "late", now).unwrap());
        tx.commit().unwrap();
        drop(guard);

        let found = repo.find_by_id("T1").unwrap().unwrap();
        assert_eq!(found.status, TransferStatus::Executed);
        assert_eq!(found.executed_by.as_deref(), Some("ctrl"));
    }

    #[test]
    fn test_list_filters_by_status_and_line() {
        let (conn, repo) = setup();
        repo.insert_with_next_code(&mut pending("T1")).unwrap();
        repo.insert_with_next_code(&mut pending("T2")).unwrap();
        {
            let mut guard = conn.lock().unwrap();
            let tx = guard.transaction().unwrap();
            TransferRepository::mark_cancelled_tx(
                &tx,
                "T1",
                "u1",
                "erreur de saisie",
                chrono::Utc::now().naive_utc(),
            )
            .unwrap();
            tx.commit().unwrap();
        }

        assert_eq!(repo.list(2026, None).unwrap().len(), 2);
        let pending_only = repo.list(2026, Some(TransferStatus::Pending)).unwrap();
        assert_eq!(pending_only.len(), 1);
        assert_eq!(pending_only[0].transfer_id, "T2");
        assert_eq!(repo.list_by_line("BL1").unwrap().len(), 2);
        assert!(repo.list(2025, None).unwrap().is_empty());
    }
}
