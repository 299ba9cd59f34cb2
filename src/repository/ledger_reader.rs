// ==========================================
// 预算承诺控制引擎 - 账本读取 Trait
// ==========================================
// 职责: 按年度返回预算线的权威数据。
// 只读,不做修改。
// 实现: BudgetLineRepository (rusqlite)
// ==========================================

use crate::domain::availability::LedgerSnapshot;
use crate::repository::error::RepositoryResult;

pub trait LedgerReader: Send + Sync {
    /// 单条预算线的快照
    ///
    /// # 返回
    /// - Ok(None): 本年度没有该 id 的预算线
    fn load_snapshot(
        &self,
        budget_line_id: &str,
        exercice: i32,
    ) -> RepositoryResult<Option<LedgerSnapshot>>;

    /// 本年度全部启用预算线的快照,按编码排序
    fn load_exercice_snapshots(&self, exercice: i32) -> RepositoryResult<Vec<LedgerSnapshot>>;
}
