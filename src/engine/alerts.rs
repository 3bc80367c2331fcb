// ==========================================
// 3D打印库存与排产系统 - 告警引擎
// ==========================================
// 机台: 处于维护状态，或 maintenance_ratio ≥ 阈值
// 耗材: free_grams ≤ reorder_point_grams
// 按需计算，不落库
// ==========================================

use crate::domain::alert::StockAlert;
use crate::domain::filament::Filament;
use crate::domain::machine::Machine;
use crate::domain::types::{AlertKind, AlertLevel, MachineStatus};
use crate::i18n::t_with_args;

pub struct AlertEngine {
    maintenance_ratio_threshold: f64,
}

impl AlertEngine {
    pub fn new(maintenance_ratio_threshold: f64) -> Self {
        Self {
            maintenance_ratio_threshold,
        }
    }

    /// 计算全部告警（机台在前，耗材在后）
    pub fn evaluate(&self, machines: &[Machine], filaments: &[Filament]) -> Vec<StockAlert> {
        let mut alerts: Vec<StockAlert> = machines
            .iter()
            .filter_map(|m| self.machine_alert(m))
            .collect();
        alerts.extend(filaments.iter().filter_map(|f| self.filament_alert(f)));
        alerts
    }

    pub fn machine_alert(&self, machine: &Machine) -> Option<StockAlert> {
        let ratio = machine.maintenance_ratio();

        let (level, message) = if machine.status == MachineStatus::Maintenance {
            (
                AlertLevel::Critical,
                t_with_args(
                    "alert.machine_maintenance",
                    &[("machine", machine.identifier.as_str())],
                ),
            )
        } else if ratio >= self.maintenance_ratio_threshold {
            let percent = format!("{:.0}", ratio * 100.0);
            (
                AlertLevel::Warning,
                t_with_args(
                    "alert.machine_ratio",
                    &[("machine", machine.identifier.as_str()), ("ratio", percent.as_str())],
                ),
            )
        } else {
            return None;
        };

        Some(StockAlert {
            kind: AlertKind::Maintenance,
            level,
            target_id: machine.identifier.clone(),
            message,
            maintenance_ratio: Some(ratio),
            free_grams: None,
            reorder_point_grams: None,
        })
    }

    pub fn filament_alert(&self, filament: &Filament) -> Option<StockAlert> {
        if !filament.needs_reorder() {
            return None;
        }

        let free = filament.free_grams();
        let level = if free == 0 {
            AlertLevel::Critical
        } else {
            AlertLevel::Warning
        };
        let free_str = free.to_string();
        let reorder_str = filament.reorder_point_grams.to_string();

        Some(StockAlert {
            kind: AlertKind::Stock,
            level,
            target_id: filament.public_id(),
            message: t_with_args(
                "alert.filament_low",
                &[
                    ("sku", filament.sku.as_str()),
                    ("free", free_str.as_str()),
                    ("reorder", reorder_str.as_str()),
                ],
            ),
            maintenance_ratio: None,
            free_grams: Some(free),
            reorder_point_grams: Some(filament.reorder_point_grams),
        })
    }
}
