// ==========================================
// 预算承诺控制引擎 - 命令层
// ==========================================
// 异步处理函数,成功返回 JSON 字符串 (Ok),失败返回 JSON 错误载荷 (Err),
// 另提供按名称分发的入口,供 RPC 宿主与命令行使用
// ==========================================

mod budget;
mod commitment;
mod common;
mod config;
mod transfer;

pub use budget::*;
pub use commitment::*;
pub use common::ErrorResponse;
pub use config::*;
pub use transfer::*;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::app::state::AppState;

/// `dispatch` 接受的全部命令名
pub const COMMANDS: &[&str] = &[
    "get_availability",
    "validate_commitment",
    "create_draft",
    "submit_commitment",
    "submit_new_commitment",
    "decide_commitment",
    "resume_commitment",
    "cancel_commitment",
    "get_commitment",
    "list_commitments",
    "create_budget_line",
    "set_budget_line_active",
    "list_budget_lines",
    "list_line_availabilities",
    "get_budget_summary",
    "list_budget_alerts",
    "list_movements",
    "list_audit_trail",
    "get_recent_actions",
    "list_forced_overrides",
    "create_transfer",
    "execute_transfer",
    "cancel_transfer",
    "list_transfers",
    "get_config_snapshot",
    "update_config",
];

/// 以 snake_case JSON 对象参数执行一条命令
pub async fn dispatch(state: &AppState, command: &str, args: &Value) -> Result<String, String> {
    tracing::debug!(command, "dispatching command");

    match command {
        "get_availability" => {
            get_availability(state, arg(args, "budget_line_id")?, arg(args, "exercice")?).await
        }
        "validate_commitment" => validate_commitment(state, arg(args, "input")?).await,
        "create_draft" => create_draft(state, arg(args, "input")?, arg(args, "actor")?).await,
        "submit_commitment" => {
            submit_commitment(state, arg(args, "request_id")?, arg(args, "actor")?).await
        }
        "submit_new_commitment" => {
            submit_new_commitment(state, arg(args, "input")?, arg(args, "actor")?).await
        }
        "decide_commitment" => {
            decide_commitment(
                state,
                arg(args, "request_id")?,
                arg(args, "decision")?,
                arg(args, "motif")?,
                arg(args, "date_reprise")?,
                arg(args, "actor")?,
            )
            .await
        }
        "resume_commitment" => {
            resume_commitment(state, arg(args, "request_id")?, arg(args, "actor")?).await
        }
        "cancel_commitment" => {
            cancel_commitment(
                state,
                arg(args, "request_id")?,
                arg(args, "motif")?,
                arg(args, "actor")?,
            )
            .await
        }
        "get_commitment" => get_commitment(state, arg(args, "request_id")?).await,
        "list_commitments" => {
            list_commitments(state, arg(args, "exercice")?, arg(args, "status")?).await
        }
        "create_budget_line" => {
            create_budget_line(state, arg(args, "input")?, arg(args, "actor")?).await
        }
        "set_budget_line_active" => {
            set_budget_line_active(
                state,
                arg(args, "budget_line_id")?,
                arg(args, "active")?,
                arg(args, "actor")?,
            )
            .await
        }
        "list_budget_lines" => list_budget_lines(state, arg(args, "exercice")?).await,
        "list_line_availabilities" => {
            list_line_availabilities(state, arg(args, "exercice")?).await
        }
        "get_budget_summary" => get_budget_summary(state, arg(args, "exercice")?).await,
        "list_budget_alerts" => list_budget_alerts(state, arg(args, "exercice")?).await,
        "list_movements" => list_movements(state, arg(args, "budget_line_id")?).await,
        "list_audit_trail" => {
            list_audit_trail(state, arg(args, "entity_type")?, arg(args, "entity_id")?).await
        }
        "get_recent_actions" => get_recent_actions(state, arg(args, "limit")?).await,
        "list_forced_overrides" => list_forced_overrides(state, arg(args, "limit")?).await,
        "create_transfer" => {
            create_transfer(state, arg(args, "input")?, arg(args, "actor")?).await
        }
        "execute_transfer" => {
            execute_transfer(state, arg(args, "transfer_id")?, arg(args, "actor")?).await
        }
        "cancel_transfer" => {
            cancel_transfer(
                state,
                arg(args, "transfer_id")?,
                arg(args, "reason")?,
                arg(args, "actor")?,
            )
            .await
        }
        "list_transfers" => {
            list_transfers(state, arg(args, "exercice")?, arg(args, "status")?).await
        }
        "get_config_snapshot" => get_config_snapshot(state).await,
        "update_config" => update_config(state, arg(args, "key")?, arg(args, "value")?).await,
        other => Err(format!("unknown command: {}", other)),
    }
}

/// 读取一个具名参数;缺失的键按 null 处理(Option 为 None)
fn arg<T: DeserializeOwned>(args: &Value, key: &str) -> Result<T, String> {
    let value = args.get(key).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| format!("invalid argument {}: {}", key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arg_reads_optional_and_required_values() {
        let args = json!({ "exercice": 2026, "request_id": "R1" });

        let exercice: Option<i32> = arg(&args, "exercice").unwrap();
        assert_eq!(exercice, Some(2026));
        let status: Option<String> = arg(&args, "status").unwrap();
        assert_eq!(status, None);
        let request_id: String = arg(&args, "request_id").unwrap();
        assert_eq!(request_id, "R1");

        let missing: Result<String, String> = arg(&args, "transfer_id");
        assert!(missing.unwrap_err().contains("transfer_id"));
    }
}
