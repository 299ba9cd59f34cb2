use crate::api::Decision;
use crate::app::state::AppState;
use crate::domain::commitment::{Actor, CommitmentInput};
use crate::domain::types::CommitmentStatus;

use super::common::{map_api_error, parse_date};

// ==========================================
// 可用额度与校验
// ==========================================

/// 单条预算线的实时可用额度
pub async fn get_availability(
    state: &AppState,
    budget_line_id: String,
    exercice: Option<i32>,
) -> Result<String, String> {
    let exercice = state.resolve_exercice(exercice)?;
    let result = state
        .commitment_api
        .get_availability(&budget_line_id, exercice)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

/// 校验预览(不写入数据)
pub async fn validate_commitment(
    state: &AppState,
    input: CommitmentInput,
) -> Result<String, String> {
    let result = state
        .commitment_api
        .validate_commitment(&input)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

// ==========================================
// 工作流
// ==========================================

pub async fn create_draft(
    state: &AppState,
    input: CommitmentInput,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .commitment_api
        .create_draft(&input, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

/// 提交已有草稿
pub async fn submit_commitment(
    state: &AppState,
    request_id: String,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .commitment_api
        .submit_commitment(&request_id, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

/// 一次调用完成创建与提交
pub async fn submit_new_commitment(
    state: &AppState,
    input: CommitmentInput,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .commitment_api
        .submit_new(&input, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

/// decision: validate | reject | defer
pub async fn decide_commitment(
    state: &AppState,
    request_id: String,
    decision: String,
    motif: Option<String>,
    date_reprise: Option<String>,
    actor: Actor,
) -> Result<String, String> {
    let decision = Decision::from_str(&decision).ok_or_else(|| {
        format!("unknown decision: {} (expected validate, reject or defer)", decision)
    })?;
    let date_reprise = date_reprise.as_deref().map(parse_date).transpose()?;

    let result = state
        .commitment_api
        .decide_commitment(&request_id, decision, motif, date_reprise, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn resume_commitment(
    state: &AppState,
    request_id: String,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .commitment_api
        .resume_commitment(&request_id, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn cancel_commitment(
    state: &AppState,
    request_id: String,
    motif: Option<String>,
    actor: Actor,
) -> Result<String, String> {
    let result = state
        .commitment_api
        .cancel_commitment(&request_id, motif, &actor)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

// ==========================================
// 查询
// ==========================================

pub async fn get_commitment(state: &AppState, request_id: String) -> Result<String, String> {
    let result = state
        .commitment_api
        .get_commitment(&request_id)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}

pub async fn list_commitments(
    state: &AppState,
    exercice: Option<i32>,
    status: Option<String>,
) -> Result<String, String> {
    let exercice = state.resolve_exercice(exercice)?;
    let status = match status {
        Some(raw) => Some(
            CommitmentStatus::from_str(&raw).ok_or_else(|| format!("unknown status: {}", raw))?,
        ),
        None => None,
    };

    let result = state
        .commitment_api
        .list_commitments(exercice, status)
        .map_err(map_api_error)?;

    serde_json::to_string(&result).map_err(|e| format!("serialization failed: {}", e))
}
