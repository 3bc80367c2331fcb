// ==========================================
// 3D打印库存与排产系统 - 库存/排产参数
// ==========================================
// 启动或请求前从 config_kv 读取一次，按值注入各 API
// ==========================================

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAINTENANCE_ALERT_RATIO: f64 = 0.9;
pub const DEFAULT_ATP_SHORT_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_ATP_LONG_WINDOW_HOURS: i64 = 72;
pub const DEFAULT_ATP_FALLBACK_GRAMS_PER_UNIT: i64 = 50;
pub const DEFAULT_ATP_FALLBACK_MINUTES_PER_UNIT: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockConfig {
    /// 维护比例告警阈值（hours_used / interval ≥ 阈值即告警）
    pub maintenance_alert_ratio: f64,
    /// ATP 短窗口 (h)
    pub atp_short_window_hours: i64,
    /// ATP 长窗口 (h)
    pub atp_long_window_hours: i64,
    /// 耗材未配置单件用量时 ATP 使用的兜底值 (g)
    pub atp_fallback_grams_per_unit: i64,
    /// 耗材未配置单件时长时 ATP 使用的兜底值 (min)
    pub atp_fallback_minutes_per_unit: i64,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            maintenance_alert_ratio: DEFAULT_MAINTENANCE_ALERT_RATIO,
            atp_short_window_hours: DEFAULT_ATP_SHORT_WINDOW_HOURS,
            atp_long_window_hours: DEFAULT_ATP_LONG_WINDOW_HOURS,
            atp_fallback_grams_per_unit: DEFAULT_ATP_FALLBACK_GRAMS_PER_UNIT,
            atp_fallback_minutes_per_unit: DEFAULT_ATP_FALLBACK_MINUTES_PER_UNIT,
        }
    }
}
