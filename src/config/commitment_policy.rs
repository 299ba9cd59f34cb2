// ==========================================
// 预算承诺控制引擎 - 承诺策略
// ==========================================
// 引擎所依赖的 config_kv 键的强类型视图
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_JUSTIFICATION_MIN_LENGTH: usize = 10;
pub const DEFAULT_LINE_LOCK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ALERT_THRESHOLD_PCT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentPolicy {
    /// 强制入账理由的最少字符数
    pub justification_min_length: usize,
    /// 等待预算线锁的最长时间
    pub line_lock_timeout_ms: u64,
    /// 调用方未传年度时的默认年度
    pub operating_exercice: Option<i32>,
    /// 预算线触发预警的消耗率(百分比)
    pub alert_threshold_pct: Decimal,
}

impl Default for CommitmentPolicy {
    fn default() -> Self {
        Self {
            justification_min_length: DEFAULT_JUSTIFICATION_MIN_LENGTH,
            line_lock_timeout_ms: DEFAULT_LINE_LOCK_TIMEOUT_MS,
            operating_exercice: None,
            alert_threshold_pct: DEFAULT_ALERT_THRESHOLD_PCT,
        }
    }
}

impl CommitmentPolicy {
    pub fn line_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.line_lock_timeout_ms)
    }
}
