use crate::app::state::AppState;
use crate::domain::commitment::Actor;
use crate::domain::transfer::NewCreditTransfer;
use crate::domain::types::TransferStatus;

use super::common::map_api_error;

// ==========================================
// 调拨 (virements)
// ==========================================

pub async fn create_transfer(
    state: &AppState,
    input: NewCreditTransfer,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .transfer_api
        .create_transfer(&input, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn execute_transfer(
    state: &AppState,
    transfer_id: String,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .transfer_api
        .execute_transfer(&transfer_id, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn cancel_transfer(
    state: &AppState,
    transfer_id: String,
    reason: String,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .transfer_api
        .cancel_transfer(&transfer_id, &reason, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn list_transfers(
    state: &AppState,
    exercice: Option<i32>,
    status: Option<String>,
) -> Result<String, String> {
    let exercice = state.resolve_exercice(exercice)?;
    let status = match status {
        Some(raw) => {
            Some(TransferStatus::from_str(&raw).ok_or_else(|| format!("unknown status: {}", raw))?)
        }
        None => None,
    };

    let result = state
        .transfer_api
        .list_transfers(exercice, status)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}
