// ==========================================
// 3D打印库存与排产系统 - 耗材领域模型
// ==========================================
// 不变量: grams_reserved ≤ grams_available
// free_grams = max(grams_available - grams_reserved, 0)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// 默认线径 (mm)
pub const DEFAULT_DIAMETER_MM: f64 = 1.75;

/// 线径下限 (mm)
pub const MIN_DIAMETER_MM: f64 = 0.10;

// ==========================================
// Filament - 耗材（材料/颜色/线径 组合的库存批次）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filament {
    pub id: i64,
    pub external_id: Option<String>, // 面板使用的友好ID（可选，唯一）
    pub sku: String,
    pub material: String,
    pub color: String,
    pub diameter: f64,
    pub grams_available: i64,
    pub grams_reserved: i64,
    pub reorder_point_grams: i64,
    pub grams_per_unit: i64,         // 单件耗材用量 (g)
    pub est_print_min_per_unit: i64, // 单件预计打印时长 (min)
    pub notes: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Filament {
    /// 可用于新预留的克数
    pub fn free_grams(&self) -> i64 {
        (self.grams_available - self.grams_reserved).max(0)
    }

    /// 对外展示ID：优先友好ID，否则数值主键
    pub fn public_id(&self) -> String {
        match &self.external_id {
            Some(ext) if !ext.trim().is_empty() => ext.clone(),
            _ => self.id.to_string(),
        }
    }

    /// 是否达到补货点
    pub fn needs_reorder(&self) -> bool {
        self.free_grams() <= self.reorder_point_grams
    }

    /// 计算调整后的可用克数
    ///
    /// 调整后的可用量不得低于已预留量
    pub fn adjusted_available(&self, delta: i64) -> DomainResult<i64> {
        let new_total = self.grams_available.checked_add(delta).ok_or_else(|| {
            DomainError::InvalidField {
                field: "delta",
                message: format!("调整量溢出: {}", delta),
            }
        })?;

        if new_total < self.grams_reserved {
            return Err(DomainError::StockBelowReservations {
                sku: self.sku.clone(),
                new_available: new_total,
                reserved: self.grams_reserved,
            });
        }

        Ok(new_total.max(0))
    }

    /// 计算一行预留所需克数
    ///
    /// # 参数
    /// - quantity: 件数（≥1）
    /// - grams_per_unit_override: 单件用量覆盖值（≤0 视为未提供）
    pub fn grams_needed(
        &self,
        quantity: i64,
        grams_per_unit_override: Option<i64>,
    ) -> DomainResult<(i64, i64)> {
        if quantity < 1 {
            return Err(DomainError::InvalidField {
                field: "qty",
                message: format!("件数必须≥1: {}", quantity),
            });
        }

        let grams_per_unit = grams_per_unit_override
            .filter(|g| *g > 0)
            .unwrap_or(self.grams_per_unit);

        if grams_per_unit <= 0 {
            return Err(DomainError::ConsumptionNormMissing {
                sku: self.sku.clone(),
            });
        }

        let needed = grams_per_unit
            .checked_mul(quantity)
            .ok_or_else(|| DomainError::InvalidField {
                field: "qty",
                message: format!("预留克数溢出: {} x {}", grams_per_unit, quantity),
            })?;

        Ok((needed, grams_per_unit))
    }

    /// 校验剩余可用量是否满足预留
    pub fn check_can_reserve(&self, grams: i64) -> DomainResult<()> {
        let free = self.free_grams();
        if free < grams {
            return Err(DomainError::InsufficientStock {
                sku: self.sku.clone(),
                needed: grams,
                free,
            });
        }
        Ok(())
    }
}

// ==========================================
// NewFilament - 新建耗材输入
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct NewFilament {
    pub external_id: Option<String>,
    pub sku: String,
    pub material: String,
    pub color: String,
    pub diameter: Option<f64>,
    pub grams_available: i64,
    pub grams_reserved: i64,
    pub reorder_point_grams: i64,
    pub grams_per_unit: i64,
    pub est_print_min_per_unit: i64,
    pub notes: String,
}

impl NewFilament {
    /// 校验必填字段与初始不变量，并规整字符串
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.sku = self.sku.trim().to_string();
        self.material = self.material.trim().to_string();
        self.color = self.color.trim().to_string();
        self.external_id = self
            .external_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if self.sku.is_empty() {
            return Err(DomainError::MissingField("sku"));
        }
        if self.material.is_empty() {
            return Err(DomainError::MissingField("material"));
        }
        if self.color.is_empty() {
            return Err(DomainError::MissingField("color"));
        }

        let diameter = self.diameter.unwrap_or(DEFAULT_DIAMETER_MM);
        if !diameter.is_finite() || diameter < MIN_DIAMETER_MM {
            return Err(DomainError::InvalidField {
                field: "diameter",
                message: format!("线径必须≥{}: {}", MIN_DIAMETER_MM, diameter),
            });
        }
        self.diameter = Some(diameter);

        for (field, value) in [
            ("gramsAvailable", self.grams_available),
            ("gramsReserved", self.grams_reserved),
            ("reorderPointGrams", self.reorder_point_grams),
            ("gramsPerUnit", self.grams_per_unit),
            ("estPrintMinPerUnit", self.est_print_min_per_unit),
        ] {
            if value < 0 {
                return Err(DomainError::InvalidField {
                    field,
                    message: format!("不能为负数: {}", value),
                });
            }
        }

        if self.grams_reserved > self.grams_available {
            return Err(DomainError::StockBelowReservations {
                sku: self.sku.clone(),
                new_available: self.grams_available,
                reserved: self.grams_reserved,
            });
        }

        Ok(self)
    }
}
