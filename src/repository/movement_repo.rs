// ==========================================
// 预算承诺控制引擎 - 预算变动流水仓储
// ==========================================
// 只追加的流水;记录在账本事务内写入
// ==========================================

use crate::domain::movement::BudgetMovement;
use crate::domain::types::MovementType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    datetime_to_sql, decimal_to_sql, get_datetime, get_decimal, get_enum,
};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

pub struct MovementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MovementRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert_tx(tx: &Transaction, movement: &BudgetMovement) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO budget_movement (
                   movement_id, budget_line_id, movement_type, delta,
                   disponible_avant, disponible_apres, ref_id, actor, created_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                movement.movement_id,
                movement.budget_line_id,
                movement.movement_type.to_db_str(),
                decimal_to_sql(&movement.delta),
                decimal_to_sql(&movement.disponible_avant),
                decimal_to_sql(&movement.disponible_apres),
                movement.ref_id,
                movement.actor,
                datetime_to_sql(&movement.created_at),
            ],
        )?;
        Ok(())
    }

    /// 单条预算线的流水,按时间升序
    pub fn find_by_line(&self, budget_line_id: &str) -> RepositoryResult<Vec<BudgetMovement>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT movement_id, budget_line_id, movement_type, delta,
                      disponible_avant, disponible_apres, ref_id, actor, created_at
               FROM budget_movement
               WHERE budget_line_id = ?
               ORDER BY created_at, rowid"#,
        )?;
        let movements = stmt
            .query_map(params![budget_line_id], |row| {
                Ok(BudgetMovement {
                    movement_id: row.get(0)?,
                    budget_line_id: row.get(1)?,
                    movement_type: get_enum(row, 2, MovementType::from_str)?,
                    delta: get_decimal(row, 3)?,
                    disponible_avant: get_decimal(row, 4)?,
                    disponible_apres: get_decimal(row, 5)?,
                    ref_id: row.get(6)?,
                    actor: row.get(7)?,
                    created_at: get_datetime(row, 8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(movements)
    }
}
