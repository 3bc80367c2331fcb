// ==========================================
// 3D打印库存与排产系统 - 可承诺量 (ATP) 估算引擎
// ==========================================
// 输入: 同一 SKU 的全部耗材批次 + 全部机台（含队列）
// 输出: 材料约束件数 与 两个时间窗口内的机台产能件数（分别给出，不取 min）
// 红线: 只读，不修改任何状态；不拼 SQL
// ==========================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StockConfig;
use crate::domain::filament::Filament;
use crate::domain::machine::Machine;

// ==========================================
// AtpEstimate - 估算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtpEstimate {
    pub sku: String,
    pub material: String,
    pub free_grams: i64,
    pub grams_per_unit: i64,
    pub units_by_materials: i64,
    pub units_available_24h: i64,
    pub units_available_72h: i64,
}

// ==========================================
// AtpEstimator - ATP 估算器
// ==========================================
pub struct AtpEstimator {
    config: StockConfig,
}

impl AtpEstimator {
    pub fn new(config: StockConfig) -> Self {
        Self { config }
    }

    /// 估算 SKU 的可承诺量
    ///
    /// # 返回
    /// - None: 没有任何耗材批次匹配该 SKU
    pub fn estimate(
        &self,
        sku: &str,
        filaments: &[Filament],
        machines: &[Machine],
    ) -> Option<AtpEstimate> {
        let lots: Vec<&Filament> = filaments.iter().filter(|f| f.sku == sku).collect();
        let first = lots.first()?;

        let free_grams: i64 = lots.iter().map(|f| f.free_grams()).sum();

        let grams_per_unit = if first.grams_per_unit > 0 {
            first.grams_per_unit
        } else {
            self.config.atp_fallback_grams_per_unit
        };
        let minutes_per_unit = if first.est_print_min_per_unit > 0 {
            first.est_print_min_per_unit
        } else {
            self.config.atp_fallback_minutes_per_unit
        };

        let units_by_materials = if grams_per_unit > 0 {
            free_grams / grams_per_unit
        } else {
            0
        };

        let capable: Vec<&Machine> = machines
            .iter()
            .filter(|m| m.is_online() && m.supports_material(&first.material))
            .collect();

        let units_within = |window_hours: i64| -> i64 {
            if minutes_per_unit <= 0 {
                return 0;
            }
            let spare: f64 = capable.iter().map(|m| m.spare_minutes(window_hours)).sum();
            (spare / minutes_per_unit as f64).floor() as i64
        };

        let estimate = AtpEstimate {
            sku: first.sku.clone(),
            material: first.material.clone(),
            free_grams,
            grams_per_unit,
            units_by_materials,
            units_available_24h: units_within(self.config.atp_short_window_hours),
            units_available_72h: units_within(self.config.atp_long_window_hours),
        };

        debug!(
            sku = %estimate.sku,
            lots = lots.len(),
            capable_machines = capable.len(),
            units_by_materials = estimate.units_by_materials,
            units_short = estimate.units_available_24h,
            units_long = estimate.units_available_72h,
            "ATP 估算完成"
        );

        Some(estimate)
    }
}
