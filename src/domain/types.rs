// ==========================================
// 预算承诺控制引擎 - 领域类型
// ==========================================
// 引擎落库的每种状态都用封闭枚举表示。
// 存储格式: SCREAMING_SNAKE_CASE(与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CommitmentStatus - 承诺申请生命周期
// ==========================================
// 终态: VALIDATED / REJECTED / CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitmentStatus {
    Draft,     // 编制中,不占用预留
    Submitted, // 已预留,等待决定
    Validated, // 预留已转入 cumul_engage
    Rejected,  // 预留已释放
    Deferred,  // 暂缓,预留仍保留
    Cancelled, // 已撤回,预留已释放
}

impl fmt::Display for CommitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl CommitmentStatus {
    /// 解析数据库中的表示
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(CommitmentStatus::Draft),
            "SUBMITTED" => Some(CommitmentStatus::Submitted),
            "VALIDATED" => Some(CommitmentStatus::Validated),
            "REJECTED" => Some(CommitmentStatus::Rejected),
            "DEFERRED" => Some(CommitmentStatus::Deferred),
            "CANCELLED" => Some(CommitmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CommitmentStatus::Draft => "DRAFT",
            CommitmentStatus::Submitted => "SUBMITTED",
            CommitmentStatus::Validated => "VALIDATED",
            CommitmentStatus::Rejected => "REJECTED",
            CommitmentStatus::Deferred => "DEFERRED",
            CommitmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommitmentStatus::Validated | CommitmentStatus::Rejected | CommitmentStatus::Cancelled
        )
    }
}

// ==========================================
// ReservationState - 预留状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    Active,
    Released,
    Converted,
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ReservationState {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Some(ReservationState::Active),
            "RELEASED" => Some(ReservationState::Released),
            "CONVERTED" => Some(ReservationState::Converted),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReservationState::Active => "ACTIVE",
            ReservationState::Released => "RELEASED",
            ReservationState::Converted => "CONVERTED",
        }
    }
}

// ==========================================
// TransferStatus - 调拨状态
// ==========================================
// 只有 EXECUTED 的调拨计入 dotation_actuelle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    Executed,
    Cancelled,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl TransferStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TransferStatus::Pending),
            "EXECUTED" => Some(TransferStatus::Executed),
            "CANCELLED" => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Executed => "EXECUTED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }
}

// ==========================================
// MovementType - 预算变动流水类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Reservation, // montant_reserve +
    Release,     // montant_reserve -
    Conversion,  // montant_reserve -> cumul_engage
    TransferIn,  // dotation_actuelle +
    TransferOut, // dotation_actuelle -
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl MovementType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "RESERVATION" => Some(MovementType::Reservation),
            "RELEASE" => Some(MovementType::Release),
            "CONVERSION" => Some(MovementType::Conversion),
            "TRANSFER_IN" => Some(MovementType::TransferIn),
            "TRANSFER_OUT" => Some(MovementType::TransferOut),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MovementType::Reservation => "RESERVATION",
            MovementType::Release => "RELEASE",
            MovementType::Conversion => "CONVERSION",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::TransferOut => "TRANSFER_OUT",
        }
    }
}

// ==========================================
// Capability - 由身份服务提供
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    ValidateCommitment, // 可执行 SUBMITTED -> VALIDATED
    ExecuteTransfer,    // 可执行待执行的调拨
}
