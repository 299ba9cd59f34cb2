// ==========================================
// 预算承诺控制引擎 - 预留仓储
// ==========================================
// ACTIVE -> RELEASED | CONVERTED,由 `WHERE state = 'ACTIVE'` 保护
// ==========================================

use crate::domain::commitment::Reservation;
use crate::domain::types::ReservationState;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    datetime_to_sql, decimal_to_sql, get_datetime, get_decimal, get_enum, get_opt_datetime,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT reservation_id, request_id, budget_line_id, amount, state, created_at, closed_at
    FROM reservation
"#;

pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert_tx(tx: &Transaction, reservation: &Reservation) -> RepositoryResult<String> {
        tx.execute(
            r#"INSERT INTO reservation (
                   reservation_id, request_id, budget_line_id, amount, state, created_at, closed_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                reservation.reservation_id,
                reservation.request_id,
                reservation.budget_line_id,
                decimal_to_sql(&reservation.amount),
                reservation.state.to_db_str(),
                datetime_to_sql(&reservation.created_at),
                reservation.closed_at.as_ref().map(datetime_to_sql),
            ],
        )?;
        Ok(reservation.reservation_id.clone())
    }

    /// 关闭一笔生效预留
    ///
    /// # 返回
    /// - Ok(false): 预留已不再生效
    pub fn close_tx(
        tx: &Transaction,
        reservation_id: &str,
        state: ReservationState,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let rows = tx.execute(
            r#"UPDATE reservation SET state = ?, closed_at = ?
               WHERE reservation_id = ? AND state = ?"#,
            params![
                state.to_db_str(),
                datetime_to_sql(&at),
                reservation_id,
                ReservationState::Active.to_db_str(),
            ],
        )?;
        Ok(rows == 1)
    }

    /// 申请的全部预留,按创建顺序
    pub fn find_by_request(&self, request_id: &str) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE request_id = ? ORDER BY created_at, reservation_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let reservations = stmt
            .query_map(params![request_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reservations)
    }

    /// 申请的生效预留
    pub fn find_active_by_request(&self, request_id: &str) -> RepositoryResult<Vec<Reservation>> {
        Ok(self
            .find_by_request(request_id)?
            .into_iter()
            .filter(Reservation::is_active)
            .collect())
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        reservation_id: row.get(0)?,
        request_id: row.get(1)?,
        budget_line_id: row.get(2)?,
        amount: get_decimal(row, 3)?,
        state: get_enum(row, 4, ReservationState::from_str)?,
        created_at: get_datetime(row, 5)?,
        closed_at: get_opt_datetime(row, 6)?,
    })
}
