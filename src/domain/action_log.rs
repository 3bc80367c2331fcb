// ==========================================
// 3D打印库存与排产系统 - 操作日志领域模型
// ==========================================
// 所有写操作记录操作人与参数，用于审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: String,
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub target: Option<String>, // 耗材ID / 机台ID / 订单ID
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    pub fn new(
        action_type: ActionType,
        actor: &str,
        target: Option<String>,
        payload_json: Option<JsonValue>,
        detail: Option<String>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            target,
            payload_json,
            detail,
        }
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateFilament,
    AdjustFilament,
    SetReorderPoint,
    DeleteFilament,
    CreateMachine,
    UpdateMachine,
    DeleteMachine,
    RegisterMaintenance,
    RecordUsage,
    EnqueueJob,
    CompleteJob,
    ReorderJob,
    Reserve,
    ConsumeReservation,
    ReleaseReservation,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateFilament => "CREATE_FILAMENT",
            ActionType::AdjustFilament => "ADJUST_FILAMENT",
            ActionType::SetReorderPoint => "SET_REORDER_POINT",
            ActionType::DeleteFilament => "DELETE_FILAMENT",
            ActionType::CreateMachine => "CREATE_MACHINE",
            ActionType::UpdateMachine => "UPDATE_MACHINE",
            ActionType::DeleteMachine => "DELETE_MACHINE",
            ActionType::RegisterMaintenance => "REGISTER_MAINTENANCE",
            ActionType::RecordUsage => "RECORD_USAGE",
            ActionType::EnqueueJob => "ENQUEUE_JOB",
            ActionType::CompleteJob => "COMPLETE_JOB",
            ActionType::ReorderJob => "REORDER_JOB",
            ActionType::Reserve => "RESERVE",
            ActionType::ConsumeReservation => "CONSUME_RESERVATION",
            ActionType::ReleaseReservation => "RELEASE_RESERVATION",
        }
    }
}
