// ==========================================
// 3D打印库存与排产系统 - 告警
// ==========================================
// 按需计算，不落库
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::types::{AlertKind, AlertLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub target_id: String, // 机台 identifier 或耗材对外ID
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_grams: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_point_grams: Option<i64>,
}
