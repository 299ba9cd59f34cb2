// ==========================================
// 预算承诺控制引擎 - 审计日志仓储
// ==========================================
// 红线: 每个写操作都记录日志
// 修改账本的操作通过 `insert_tx` 写入审计记录,
// 与修改处于同一事务
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
