// ==========================================
// 3D打印库存与排产系统 - 审计留痕
// ==========================================
// 每个成功的管理写操作写一条 action_log
// 写日志失败只告警，不影响已提交的主操作
// ==========================================

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::warn;

use crate::api::auth::Operator;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::action_log_repo::ActionLogRepository;

#[derive(Clone)]
pub struct AuditTrail {
    action_log_repo: Arc<ActionLogRepository>,
}

impl AuditTrail {
    pub fn new(action_log_repo: Arc<ActionLogRepository>) -> Self {
        Self { action_log_repo }
    }

    pub fn record(
        &self,
        operator: &Operator,
        action_type: ActionType,
        target: &str,
        payload: JsonValue,
        detail: String,
    ) {
        let log = ActionLog::new(
            action_type,
            &operator.username,
            Some(target.to_string()),
            Some(payload),
            Some(detail),
        );

        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(
                action_type = action_type.as_str(),
                target = target,
                error = %e,
                "操作日志写入失败"
            );
        }
    }

    pub fn recent(&self, limit: i32) -> crate::repository::RepositoryResult<Vec<ActionLog>> {
        self.action_log_repo.find_recent(limit)
    }
}
