// ==========================================
// 预算承诺控制引擎 - 承诺申请仓储
// ==========================================
// commitment_request + commitment_allocation(按 seq_no 排序)
// 状态变更: 基于 revision 的比较并设置
// ==========================================

use crate::domain::commitment::{Allocation, CommitmentRequest, StatusChange};
use crate::domain::types::CommitmentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    date_to_sql, datetime_to_sql, decimal_to_sql, get_datetime, get_decimal, get_enum,
    get_opt_date, get_opt_datetime,
};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT request_id, exercice, object, total_amount, forced, justification, status,
           motif, date_reprise, verdict_snapshot_json,
           created_by, created_at, submitted_by, submitted_at, deferred_by, deferred_at,
           decided_by, decided_at, updated_at, revision
    FROM commitment_request
"#;

pub struct CommitmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CommitmentRepository {
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

    /// 插入申请及其分配
    pub fn insert_tx(tx: &Transaction, request: &CommitmentRequest) -> RepositoryResult<String> {
        tx.execute(
            r#"INSERT INTO commitment_request (
                   request_id, exercice, object, total_amount, forced, justification, status,
                   motif, date_reprise, verdict_snapshot_json,
                   created_by, created_at, submitted_by, submitted_at, deferred_by, deferred_at,
                   decided_by, decided_at, updated_at, revision
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                request.request_id,
                request.exercice,
                request.object,
                decimal_to_sql(&request.total_amount),
                request.forced,
                request.justification,
                request.status.to_db_str(),
                request.motif,
                request.date_reprise.as_ref().map(date_to_sql),
                request.verdict_snapshot_json,
                request.created_by,
                datetime_to_sql(&request.created_at),
                request.submitted_by,
                request.submitted_at.as_ref().map(datetime_to_sql),
                request.deferred_by,
                request.deferred_at.as_ref().map(datetime_to_sql),
                request.decided_by,
                request.decided_at.as_ref().map(datetime_to_sql),
                datetime_to_sql(&request.updated_at),
                request.revision,
            ],
        )?;

        let mut stmt = tx.prepare(
            r#"INSERT INTO commitment_allocation (request_id, seq_no, budget_line_id, amount)
               VALUES (?, ?, ?, ?)"#,
        )?;
        for (seq_no, allocation) in request.allocations.iter().enumerate() {
            stmt.execute(params![
                request.request_id,
                seq_no as i64,
                allocation.budget_line_id,
                decimal_to_sql(&allocation.amount),
            ])?;
        }

        Ok(request.request_id.clone())
    }

    /// 执行一次工作流迁移(基于 status + revision 的比较并设置)
    ///
    /// 字段规则:
    /// - `motif`: 驳回 / 暂缓 / 取消时写入,其余迁移清空
    /// - `date_reprise`、`deferred_*`: 只由暂缓写入
    /// - `submitted_*`: 只由首次提交写入(恢复不写)
    /// - `decided_*`: 由通过 / 驳回 / 取消写入
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: 读取后申请已被修改
    /// - `NotFound`
    pub fn apply_status_change_tx(tx: &Transaction, change: &StatusChange) -> RepositoryResult<()> {
        use CommitmentStatus::*;

        let at = datetime_to_sql(&change.at);
        let first_submission = change.from == Draft && change.to == Submitted;
        let deferral = change.to == Deferred;
        let final_decision = matches!(change.to, Validated | Rejected | Cancelled);
        let motif = match change.to {
            Rejected | Deferred | Cancelled => change.motif.as_deref(),
            _ => None,
        };

        let rows_affected = tx.execute(
            r#"UPDATE commitment_request
               SET status = ?1,
                   motif = ?2,
                   date_reprise = CASE WHEN ?3 THEN ?4 ELSE date_reprise END,
                   deferred_by = CASE WHEN ?3 THEN ?5 ELSE deferred_by END,
                   deferred_at = CASE WHEN ?3 THEN ?6 ELSE deferred_at END,
                   verdict_snapshot_json = COALESCE(?7, verdict_snapshot_json),
                   submitted_by = CASE WHEN ?8 THEN ?5 ELSE submitted_by END,
                   submitted_at = CASE WHEN ?8 THEN ?6 ELSE submitted_at END,
                   decided_by = CASE WHEN ?9 THEN ?5 ELSE decided_by END,
                   decided_at = CASE WHEN ?9 THEN ?6 ELSE decided_at END,
                   updated_at = ?6,
                   revision = revision + 1
               WHERE request_id = ?10 AND status = ?11 AND revision = ?12"#,
            params![
                change.to.to_db_str(),
                motif,
                deferral,
                change.date_reprise.as_ref().map(date_to_sql),
                change.actor,
                at,
                change.verdict_snapshot_json,
                first_submission,
                final_decision,
                change.request_id,
                change.from.to_db_str(),
                change.expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            let actual: Option<i32> = tx
                .query_row(
                    "SELECT revision FROM commitment_request WHERE request_id = ?",
                    params![change.request_id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    entity: "CommitmentRequest".to_string(),
                    id: change.request_id.clone(),
                    expected: change.expected_revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "CommitmentRequest".to_string(),
                    id: change.request_id.clone(),
                },
            });
        }

        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, request_id: &str) -> RepositoryResult<Option<CommitmentRequest>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE request_id = ?", SELECT_COLUMNS);
        let request = conn
            .query_row(&sql, params![request_id], map_row)
            .optional()?;

        match request {
            Some(mut request) => {
                request.allocations = load_allocations(&conn, &request.request_id)?;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    /// 本年度申请,可按状态过滤,按时间降序
    pub fn list(
        &self,
        exercice: i32,
        status: Option<CommitmentStatus>,
    ) -> RepositoryResult<Vec<CommitmentRequest>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE exercice = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY created_at DESC, request_id",
            SELECT_COLUMNS
        );
        let requests = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![exercice, status.map(|s| s.to_db_str())], map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        requests
            .into_iter()
            .map(|mut request| {
                request.allocations = load_allocations(&conn, &request.request_id)?;
                Ok(request)
            })
            .collect()
    }
}

fn load_allocations(conn: &Connection, request_id: &str) -> RepositoryResult<Vec<Allocation>> {
    let mut stmt = conn.prepare(
        r#"SELECT budget_line_id, amount FROM commitment_allocation
           WHERE request_id = ? ORDER BY seq_no"#,
    )?;
    let allocations = stmt
        .query_map(params![request_id], |row| {
            Ok(Allocation {
                budget_line_id: row.get(0)?,
                amount: get_decimal(row, 1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(allocations)
}

/// 分配单独加载
fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CommitmentRequest> {
    Ok(CommitmentRequest {
        request_id: row.get(0)?,
        exercice: row.get(1)?,
        object: row.get(2)?,
        allocations: Vec::new(),
        total_amount: get_decimal(row, 3)?,
        forced: row.get(4)?,
        justification: row.get(5)?,
        status: get_enum(row, 6, CommitmentStatus::from_str)?,
        motif: row.get(7)?,
        date_reprise: get_opt_date(row, 8)?,
        verdict_snapshot_json: row.get(9)?,
        created_by: row.get(10)?,
        created_at: get_datetime(row, 11)?,
        submitted_by: row.get(12)?,
        submitted_at: get_opt_datetime(row, 13)?,
        deferred_by: row.get(14)?,
        deferred_at: get_opt_datetime(row, 15)?,
        decided_by: row.get(16)?,
        decided_at: get_opt_datetime(row, 17)?,
        updated_at: get_datetime(row, 18)?,
        revision: row.get(19)?,
    })
}
