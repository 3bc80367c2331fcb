// ==========================================
// 3D打印库存与排产系统 - 库存总览 / ATP API
// ==========================================
// 职责: 快照（耗材 + 机台队列 + 告警）、ATP 估算、操作日志查询
// 红线: 只读，不修改任何状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::audit::AuditTrail;
use crate::api::auth::{require_admin, Operator};
use crate::api::error::{ApiError, ApiResult};
use crate::api::filament_api::FilamentView;
use crate::api::machine_api::MachineView;
use crate::config::StockConfig;
use crate::domain::action_log::ActionLog;
use crate::domain::alert::StockAlert;
use crate::engine::{AlertEngine, AtpEstimate, AtpEstimator};
use crate::repository::stock_repo::{StockRepository, StockRows};

/// 操作日志单次查询上限
pub const MAX_RECENT_ACTIONS: i32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub filaments: Vec<FilamentView>,
    pub machines: Vec<MachineView>,
    pub alerts: Vec<StockAlert>,
}

// ==========================================
// StockApi - 总览 API
// ==========================================
pub struct StockApi {
    stock_repo: Arc<StockRepository>,
    audit: AuditTrail,
    config: StockConfig,
}

impl StockApi {
    pub fn new(stock_repo: Arc<StockRepository>, audit: AuditTrail, config: StockConfig) -> Self {
        Self {
            stock_repo,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    /// 库存总览：全部耗材、全部机台（含队列）、实时告警
    pub fn snapshot(&self, operator: &Operator) -> ApiResult<StockSnapshot> {
        require_admin(operator)?;

        // 耗材与机台在同一读事务内取得，告警与列表一致
        let StockRows { filaments, machines } = self.stock_repo.load_all()?;
        let alerts = AlertEngine::new(self.config.maintenance_alert_ratio).evaluate(&machines, &filaments);

        debug!(
            filaments = filaments.len(),
            machines = machines.len(),
            alerts = alerts.len(),
            "生成库存快照"
        );

        Ok(StockSnapshot {
            machines: machines.iter().map(MachineView::from).collect(),
            filaments: filaments.into_iter().map(FilamentView::from).collect(),
            alerts,
        })
    }

    /// SKU 可承诺量估算
    ///
    /// # 失败
    /// - SKU 为空 → Validation
    /// - 没有任何耗材匹配该 SKU → Validation
    pub fn atp(&self, operator: &Operator, sku: &str) -> ApiResult<AtpEstimate> {
        require_admin(operator)?;

        let sku = sku.trim();
        if sku.is_empty() {
            return Err(ApiError::InvalidInput("SKU不能为空".to_string()));
        }

        let StockRows {
            filaments: lots,
            machines,
        } = self.stock_repo.load_for_sku(sku)?;

        AtpEstimator::new(self.config)
            .estimate(sku, &lots, &machines)
            .ok_or_else(|| {
                warn!(sku = sku, "ATP 查询的 SKU 无对应耗材");
                ApiError::ValidationError(format!("SKU {} 无对应耗材", sku))
            })
    }

    /// 最近的管理操作（新→旧）
    pub fn list_recent_actions(&self, operator: &Operator, limit: i32) -> ApiResult<Vec<ActionLog>> {
        require_admin(operator)?;
        Ok(self.audit.recent(limit.clamp(1, MAX_RECENT_ACTIONS))?)
    }
}
