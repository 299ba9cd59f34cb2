// ==========================================
// 预算承诺控制引擎 - 工作单元
// ==========================================
// 用一个 IMMEDIATE 事务包裹由各仓储 `_tx` 函数
// 组成的闭包。Ok 时提交,Err 时回滚(析构)。
// ==========================================

use crate::repository::error::RepositoryError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct UnitOfWork {
    conn: Arc<Mutex<Connection>>,
}

impl UnitOfWork {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 原子地执行 `work`
    ///
    /// `work` 返回任何错误都会丢弃其全部写入
    pub fn run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let out = work(&tx)?;

        tx.commit().map_err(RepositoryError::from)?;
        Ok(out)
    }
}
