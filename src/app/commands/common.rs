use crate::api::error::ApiError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// 公共辅助: 错误映射与日期解析
// ==========================================

/// 返回给调用方的错误载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 稳定的错误码
    pub code: String,

    /// 可读的错误信息
    pub message: String,

    /// 结构化详情(缺口明细等)
    pub details: Option<serde_json::Value>,

    /// 重试是否可能成功(强制入账或最新快照)
    pub recoverable: bool,
}

/// 将 ApiError 映射为 JSON 载荷
pub(crate) fn map_api_error(err: ApiError) -> String {
    let error_response = ErrorResponse {
        code: match &err {
            ApiError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ApiError::ValidationMismatch { .. } => "VALIDATION_MISMATCH",
            ApiError::MissingJustification { .. } => "MISSING_JUSTIFICATION",
            ApiError::InvalidStateTransition { .. } => "INVALID_TRANSITION",
            ApiError::MissingField(_) => "MISSING_FIELD",
            ApiError::PermissionDenied(_) => "PERMISSION_DENIED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
        .to_string(),
        message: err.to_string(),
        details: match &err {
            ApiError::InsufficientFunds { deficit, shortfalls } => Some(serde_json::json!({
                "deficit": deficit,
                "shortfalls": shortfalls,
            })),
            ApiError::ValidationMismatch { declared, allocated } => Some(serde_json::json!({
                "declared": declared,
                "allocated": allocated,
            })),
            ApiError::MissingJustification { min_length, actual } => Some(serde_json::json!({
                "min_length": min_length,
                "actual": actual,
            })),
            ApiError::InvalidStateTransition { from, to } => Some(serde_json::json!({
                "from": from,
                "to": to,
            })),
            _ => None,
        },
        recoverable: err.is_recoverable(),
    };

    serde_json::to_string(&error_response).unwrap_or_else(|_| err.to_string())
}

/// 解析 YYYY-MM-DD 格式日期
pub(crate) fn parse_date(date_str: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date (expected YYYY-MM-DD): {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_payload_carries_deficit() {
        let raw = map_api_error(ApiError::InsufficientFunds {
            deficit: dec!(50000),
            shortfalls: vec![],
        });
        let response: ErrorResponse = serde_json::from_str(&raw).unwrap();

        assert_eq!(response.code, "INSUFFICIENT_FUNDS");
        assert!(response.recoverable);
        assert_eq!(response.details.unwrap()["deficit"], "50000");
    }

    #[test]
    fn test_not_found_payload() {
        let raw = map_api_error(ApiError::NotFound("BudgetLine(id=X)".to_string()));
        let response: ErrorResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(response.code, "NOT_FOUND");
        assert!(!response.recoverable);
        assert!(response.details.is_none());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2026-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
        assert!(parse_date("15/03/2026").is_err());
    }
}
