// ==========================================
// 3D打印库存与排产系统 - 耗材预留领域模型
// ==========================================
// 生命周期: none → reserved → {consumed | released}
// order_id 为外部订单的不透明关联键，不是外键
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;

use crate::domain::error::{DomainError, DomainResult};

// ==========================================
// FilamentReservation - 预留记录
// ==========================================
// 唯一约束: (order_id, filament_id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilamentReservation {
    pub id: i64,
    pub order_id: String,
    pub filament_id: i64,
    pub filament_sku: String,
    pub filament_public_id: String,
    pub grams: i64,
    pub metadata: JsonValue, // {"sku", "qty", "gramsPerUnit"}
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FilamentReservation {
    /// 预留时记录的件数
    pub fn quantity(&self) -> Option<i64> {
        self.metadata.get("qty").and_then(JsonValue::as_i64)
    }
}

/// 预留结算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Settlement {
    Consume, // 转为永久扣减
    Release, // 取消，退回可用池
}

impl Settlement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Settlement::Consume => "consume",
            Settlement::Release => "release",
        }
    }
}

// ==========================================
// ReservationLine - 预留请求行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationLine {
    pub sku: String,
    pub quantity: i64,
    pub grams_per_unit: Option<i64>,
}

/// 校验一个预留批次的请求
///
/// 规则: order_id 非空、至少一行、SKU 非空且不重复、件数≥1
pub fn normalize_lines(
    order_id: &str,
    lines: Vec<ReservationLine>,
) -> DomainResult<(String, Vec<ReservationLine>)> {
    let order_id = order_id.trim().to_string();
    if order_id.is_empty() {
        return Err(DomainError::MissingField("orderId"));
    }
    if lines.is_empty() {
        return Err(DomainError::MissingField("items"));
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let sku = line.sku.trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::MissingField("sku"));
        }
        if line.quantity < 1 {
            return Err(DomainError::InvalidField {
                field: "qty",
                message: format!("件数必须≥1: sku={}, qty={}", sku, line.quantity),
            });
        }
        if !seen.insert(sku.clone()) {
            return Err(DomainError::InvalidField {
                field: "items",
                message: format!("同一订单内SKU重复: {}", sku),
            });
        }
        out.push(ReservationLine {
            sku,
            quantity: line.quantity,
            grams_per_unit: line.grams_per_unit,
        });
    }
    Ok((order_id, out))
}

/// 已有预留是否与重试请求一致（仅比较 SKU 与件数）
pub fn matches_request(existing: &[FilamentReservation], lines: &[ReservationLine]) -> bool {
    if existing.len() != lines.len() {
        return false;
    }
    let mut stored: Vec<(&str, Option<i64>)> = existing
        .iter()
        .map(|r| (r.filament_sku.as_str(), r.quantity()))
        .collect();
    let mut requested: Vec<(&str, Option<i64>)> = lines
        .iter()
        .map(|l| (l.sku.as_str(), Some(l.quantity)))
        .collect();
    stored.sort();
    requested.sort();
    stored == requested
}
