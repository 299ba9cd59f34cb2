use crate::app::state::AppState;
use crate::domain::budget_line::NewBudgetLine;
use crate::domain::commitment::Actor;

use super::common::map_api_error;

// ==========================================
// 预算线与流水
// ==========================================

pub async fn create_budget_line(
    state: &AppState,
    input: NewBudgetLine,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .budget_api
        .create_budget_line(&input, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn set_budget_line_active(
    state: &AppState,
    budget_line_id: String,
    active: bool,
    actor: Actor,
) -> Result<String, String> {
    state
        .budget_api
        .set_line_active(&budget_line_id, active, &actor)
        .map_err(map_api_error)?;

    Ok("{}".to_string())
}

pub async fn list_budget_lines(state: &AppState, exercice: Option<i32>) -> Result<String, String> {
    let exercice = state.resolve_exercice(exercice)?;
    let result = state
        .budget_api
        .list_budget_lines(exercice)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

/// 每条启用预算线的额度明细
pub async fn list_line_availabilities(
    state: &AppState,
    exercice: Option<i32>,
) -> Result<String, String> {
    let exercice = state.resolve_exercice(exercice)?;
    let result = state
        .budget_api
        .list_line_availabilities(exercice)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn get_budget_summary(state: &AppState, exercice: Option<i32>) -> Result<String, String> {
    let exercice = state.resolve_exercice(exercice)?;
    let result = state
        .budget_api
        .get_budget_summary(exercice)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

/// 达到或超过消耗预警阈值的预算线
pub async fn list_budget_alerts(state: &AppState, exercice: Option<i32>) -> Result<String, String> {
    let exercice = state.resolve_exercice(exercice)?;
    let result = state
        .budget_api
        .list_budget_alerts(exercice)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn list_movements(state: &AppState, budget_line_id: String) -> Result<String, String> {
    let result = state
        .budget_api
        .list_movements(&budget_line_id)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn list_audit_trail(
    state: &AppState,
    entity_type: String,
    entity_id: String,
) -> Result<String, String> {
    let result = state
        .budget_api
        .list_audit_trail(&entity_type, &entity_id)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn get_recent_actions(state: &AppState, limit: Option<i32>) -> Result<String, String> {
    let result = state
        .budget_api
        .list_recent_actions(limit.unwrap_or(50))
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

/// 强制入账记录及其理由
pub async fn list_forced_overrides(state: &AppState, limit: Option<i32>) -> Result<String, String> {
    let result = state
        .budget_api
        .list_forced_overrides(limit.unwrap_or(50))
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}
