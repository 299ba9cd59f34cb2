// ==========================================
// 预算承诺控制引擎 - API 错误
// ==========================================
// 将仓储层与引擎层错误转换为面向调用方的错误。
// 每条错误信息都明确给出原因。
// ==========================================

use crate::engine::error::CommitmentError;
use crate::engine::validator::AllocationCheck;
use crate::repository::error::RepositoryError;
use rust_decimal::Decimal;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 预算控制
    // ==========================================
    /// 可恢复: 附理由以强制方式重新提交
    #[error("insufficient funds: deficit={deficit}")]
    InsufficientFunds {
        deficit: Decimal,
        shortfalls: Vec<AllocationCheck>,
    },

    #[error("allocations total {allocated} but the request declares {declared}")]
    ValidationMismatch { declared: Decimal, allocated: Decimal },

    #[error("forced override needs a justification of at least {min_length} characters (got {actual})")]
    MissingJustification { min_length: usize, actual: usize },

    // ==========================================
    // 工作流
    // ==========================================
    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // ==========================================
    // 输入 / 查找
    // ==========================================
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("business rule violated: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发
    // ==========================================
    /// 可恢复: 基于最新快照重试
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    // ==========================================
    // 数据访问
    // ==========================================
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// InsufficientFunds 与 ConcurrencyConflict 可重试
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::InsufficientFunds { .. } | ApiError::ConcurrencyConflict(_)
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => ApiError::ConcurrencyConflict(format!(
                "{} {} was modified concurrently (expected revision={}, actual revision={})",
                entity, id, expected, actual
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::LockError(msg) => ApiError::DatabaseConnectionError(format!(
                "database lock acquisition failed: {}",
                msg
            )),
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("unique constraint violated: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("foreign key constraint violated: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("stored field {} is invalid: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 CommitmentError 转换
// ==========================================
impl From<CommitmentError> for ApiError {
    fn from(err: CommitmentError) -> Self {
        match err {
            CommitmentError::InsufficientFunds { deficit, shortfalls } => {
                ApiError::InsufficientFunds { deficit, shortfalls }
            }
            CommitmentError::ValidationMismatch { declared, allocated } => {
                ApiError::ValidationMismatch { declared, allocated }
            }
            CommitmentError::MissingJustification { min_length, actual } => {
                ApiError::MissingJustification { min_length, actual }
            }
            CommitmentError::InvalidTransition { from, to } => ApiError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            CommitmentError::MissingField { field } => ApiError::MissingField(field),
            CommitmentError::ConcurrencyConflict { message } => {
                ApiError::ConcurrencyConflict(message)
            }
            CommitmentError::InvalidRequest(msg) => ApiError::InvalidInput(msg),
            CommitmentError::MissingCapability { actor, capability } => ApiError::PermissionDenied(
                format!("{} lacks capability {:?}", actor, capability),
            ),
            CommitmentError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            CommitmentError::Serialization(e) => {
                ApiError::InternalError(format!("serialization failed: {}", e))
            }
            CommitmentError::Repository(e) => ApiError::from(e),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Capability, CommitmentStatus};
    use rust_decimal_macros::dec;

    #[test]
    fn test_repository_error_conversion() {
        let api_err: ApiError = RepositoryError::NotFound {
            entity: "BudgetLine".to_string(),
            id: "BL-404".to_string(),
        }
        .into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("BudgetLine"));
                assert!(msg.contains("BL-404"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let api_err: ApiError = RepositoryError::OptimisticLockFailure {
            entity: "BudgetLine".to_string(),
            id: "BL1".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(api_err, ApiError::ConcurrencyConflict(_)));
        assert!(api_err.is_recoverable());
    }

    #[test]
    fn test_commitment_error_conversion_keeps_deficit() {
        let api_err: ApiError = CommitmentError::InsufficientFunds {
            deficit: dec!(50000),
            shortfalls: vec![],
        }
        .into();
        match api_err {
            ApiError::InsufficientFunds { deficit, .. } => assert_eq!(deficit, dec!(50000)),
            other => panic!("Expected InsufficientFunds, got {:?}", other),
        }
    }

    #[test]
    fn test_workflow_errors_are_not_recoverable() {
        let api_err: ApiError = CommitmentError::InvalidTransition {
            from: CommitmentStatus::Validated,
            to: CommitmentStatus::Submitted,
        }
        .into();
        assert!(api_err.to_string().contains("VALIDATED"));
        assert!(!api_err.is_recoverable());

        let api_err: ApiError = CommitmentError::MissingCapability {
            actor: "agent".to_string(),
            capability: Capability::ValidateCommitment,
        }
        .into();
        assert!(matches!(api_err, ApiError::PermissionDenied(_)));
    }
}
