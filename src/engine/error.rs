// ==========================================
// 预算承诺控制引擎 - 引擎错误
// ==========================================
// 可恢复: InsufficientFunds(附理由强制重试),
//         ConcurrencyConflict(基于最新快照重试)
// 其余错误对当前提交的申请均为致命错误
// ==========================================

use crate::domain::types::{Capability, CommitmentStatus};
use crate::engine::validator::AllocationCheck;
use crate::repository::error::RepositoryError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommitmentError {
    #[error("insufficient funds: deficit={deficit}")]
    InsufficientFunds {
        deficit: Decimal,
        shortfalls: Vec<AllocationCheck>,
    },

    #[error("allocation sum {allocated} does not match declared total {declared}")]
    ValidationMismatch { declared: Decimal, allocated: Decimal },

    #[error("forced override needs a justification of at least {min_length} characters (got {actual})")]
    MissingJustification { min_length: usize, actual: usize },

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: CommitmentStatus,
        to: CommitmentStatus,
    },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("concurrency conflict: {message}")]
    ConcurrencyConflict { message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("actor {actor} lacks capability {capability:?}")]
    MissingCapability {
        actor: String,
        capability: Capability,
    },

    #[error("{entity} not found: id={id}")]
    NotFound { entity: String, id: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl CommitmentError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CommitmentError::InsufficientFunds { .. } | CommitmentError::ConcurrencyConflict { .. }
        )
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        CommitmentError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CommitmentError::ConcurrencyConflict {
            message: message.into(),
        }
    }
}

// 账本事务内 revision 不一致即为竞争失败
impl From<RepositoryError> for CommitmentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => CommitmentError::ConcurrencyConflict {
                message: format!(
                    "{} {} changed concurrently (expected revision {}, found {})",
                    entity, id, expected, actual
                ),
            },
            RepositoryError::NotFound { entity, id } => CommitmentError::NotFound { entity, id },
            other => CommitmentError::Repository(other),
        }
    }
}

pub type CommitmentResult<T> = Result<T, CommitmentError>;
