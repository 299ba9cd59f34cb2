// ==========================================
// 预算承诺控制引擎 - 预算线锁登记表
// ==========================================
// 对预算线合计的每次 读取-判断-写入 按预算线互斥。
// 按排序顺序加锁(多预算线申请之间
// 不会死锁);等待时间受配置的超时限制。
// revision 列是事务内的第二道防线。
// 槽位仅在有守卫持有或等待该预算线时存在。
// ==========================================

use crate::engine::error::{CommitmentError, CommitmentResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Default)]
struct LineSlot {
    held: Mutex<bool>,
    released: Condvar,
}

impl LineSlot {
    fn unlock(&self) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        *held = false;
        self.released.notify_one();
    }
}

type SlotMap = Arc<Mutex<HashMap<String, Arc<LineSlot>>>>;

pub struct LineLockRegistry {
    slots: SlotMap,
    timeout: Duration,
}

impl LineLockRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    fn slot(&self, budget_line_id: &str) -> CommitmentResult<Arc<LineSlot>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| CommitmentError::conflict(format!("line lock registry poisoned: {}", e)))?;
        Ok(slots
            .entry(budget_line_id.to_string())
            .or_default()
            .clone())
    }

    /// 锁定全部预算线(去重并排序)
    ///
    /// # 错误
    /// - `ConcurrencyConflict`: 某条预算线超时仍被锁定;
    ///   已获取的锁会被释放
    pub fn acquire<S: AsRef<str>>(&self, budget_line_ids: &[S]) -> CommitmentResult<LineLockGuard> {
        let ordered: BTreeSet<&str> = budget_line_ids.iter().map(|id| id.as_ref()).collect();
        let deadline = Instant::now() + self.timeout;

        let mut guard = LineLockGuard {
            line_ids: Vec::with_capacity(ordered.len()),
            slots: Vec::with_capacity(ordered.len()),
            registry: self.slots.clone(),
        };

        for line_id in ordered {
            let slot = self.slot(line_id)?;
            {
                let held = slot
                    .held
                    .lock()
                    .map_err(|e| CommitmentError::conflict(format!("line lock poisoned: {}", e)))?;
                let remaining = deadline.saturating_duration_since(Instant::now());
                let (mut held, wait) = slot
                    .released
                    .wait_timeout_while(held, remaining, |held| *held)
                    .map_err(|e| CommitmentError::conflict(format!("line lock poisoned: {}", e)))?;

                if wait.timed_out() && *held {
                    let timeout_ms = self.timeout.as_millis() as u64;
                    warn!(budget_line_id = line_id, timeout_ms, "line lock timeout");
                    // `guard` 在此析构并释放已持有的锁
                    return Err(CommitmentError::conflict(format!(
                        "budget line {} is busy, retry later",
                        line_id
                    )));
                }
                *held = true;
            }
            guard.line_ids.push(line_id.to_string());
            guard.slots.push(slot);
        }

        debug!(lines = ?guard.line_ids, "line locks acquired");
        Ok(guard)
    }
}

/// 析构时释放其持有的预算线
pub struct LineLockGuard {
    line_ids: Vec<String>,
    slots: Vec<Arc<LineSlot>>,
    registry: SlotMap,
}

impl LineLockGuard {
    pub fn line_ids(&self) -> &[String] {
        &self.line_ids
    }

    pub fn covers(&self, budget_line_id: &str) -> bool {
        self.line_ids.iter().any(|id| id == budget_line_id)
    }
}

impl Drop for LineLockGuard {
    fn drop(&mut self) {
        for slot in self.slots.drain(..).rev() {
            slot.unlock();
        }

        // 克隆只在持有 map 锁时产生,计数为 1 即表示空闲
        let mut slots = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        for line_id in &self.line_ids {
            if slots.get(line_id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                slots.remove(line_id);
            }
        }
    }
}
