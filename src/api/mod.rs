// ==========================================
// 预算承诺控制引擎 - API 层
// ==========================================
// 供命令层调用的业务 API
// ==========================================

pub mod budget_api;
pub mod commitment_api;
pub mod error;
pub mod transfer_api;

pub use budget_api::BudgetApi;
pub use commitment_api::{
    CommitmentApi, CommitmentDetail, Decision, SubmitResult, ValidationResult,
};
pub use error::{ApiError, ApiResult};
pub use transfer_api::TransferApi;
