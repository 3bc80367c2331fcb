// ==========================================
// 3D打印库存与排产系统 - 耗材预留 API
// ==========================================
// 生命周期: none → reserved → {consumed | released}
// 红线: 一个订单的一批预留整体成功或整体失败
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::audit::AuditTrail;
use crate::api::auth::{require_admin, Operator};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionType;
use crate::domain::reservation::{
    matches_request, normalize_lines, FilamentReservation, ReservationLine, Settlement,
};
use crate::repository::reservation_repo::ReservationRepository;

// ==========================================
// 请求 / 响应 DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveItem {
    pub sku: String,
    pub qty: i64,
    #[serde(default)]
    pub grams_per_unit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    pub order_id: String,
    #[serde(default)]
    pub items: Vec<ReserveItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub id: i64,
    pub order_id: String,
    pub filament: String, // 耗材对外ID
    pub filament_sku: String,
    pub grams: i64,
    pub metadata: JsonValue,
    pub created_at: NaiveDateTime,
}

impl From<FilamentReservation> for ReservationView {
    fn from(r: FilamentReservation) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            filament: r.filament_public_id,
            filament_sku: r.filament_sku,
            grams: r.grams,
            metadata: r.metadata,
            created_at: r.created_at,
        }
    }
}

fn total_grams(reservations: &[FilamentReservation]) -> i64 {
    reservations.iter().map(|r| r.grams).sum()
}

// ==========================================
// ReservationApi - 预留 API
// ==========================================
pub struct ReservationApi {
    reservation_repo: Arc<ReservationRepository>,
    audit: AuditTrail,
}

impl ReservationApi {
    pub fn new(reservation_repo: Arc<ReservationRepository>, audit: AuditTrail) -> Self {
        Self {
            reservation_repo,
            audit,
        }
    }

    /// 为订单预留耗材
    ///
    /// 订单已有预留时原样返回（重试幂等），不会重复扣减
    pub fn reserve(&self, operator: &Operator, req: ReserveRequest) -> ApiResult<Vec<ReservationView>> {
        require_admin(operator)?;

        let order_id = Self::require_order_id(&req.order_id)?.to_string();
        let lines: Vec<ReservationLine> = req
            .items
            .into_iter()
            .map(|item| ReservationLine {
                sku: item.sku,
                quantity: item.qty,
                grams_per_unit: item.grams_per_unit,
            })
            .collect();

        // 已有预留的订单直接返回既有记录，不再校验本次明细
        let existing = self.reservation_repo.list_by_order(&order_id)?;
        if !existing.is_empty() {
            Self::log_replay(&order_id, &existing, &lines);
            return Ok(existing.into_iter().map(ReservationView::from).collect());
        }

        let (order_id, lines) = normalize_lines(&order_id, lines).map_err(|e| {
            warn!(order_id = %order_id, error = %e, "预留请求校验失败");
            ApiError::from(e)
        })?;

        let batch = self
            .reservation_repo
            .reserve_batch(&order_id, &lines)
            .map_err(|e| {
                warn!(order_id = %order_id, error = %e, "预留失败，整批回滚");
                ApiError::from(e)
            })?;

        if batch.replayed {
            Self::log_replay(&order_id, &batch.reservations, &lines);
        } else {
            let grams = total_grams(&batch.reservations);
            info!(
                order_id = %order_id,
                rows = batch.reservations.len(),
                grams,
                actor = %operator.username,
                "预留耗材"
            );
            self.audit.record(
                operator,
                ActionType::Reserve,
                &order_id,
                json!({
                    "items": lines
                        .iter()
                        .map(|l| json!({ "sku": l.sku, "qty": l.quantity, "gramsPerUnit": l.grams_per_unit }))
                        .collect::<Vec<_>>(),
                    "grams": grams,
                }),
                format!("订单 {} 预留 {}g", order_id, grams),
            );
        }

        Ok(batch.reservations.into_iter().map(ReservationView::from).collect())
    }

    /// 消耗订单预留（转为永久扣减）
    pub fn consume(&self, operator: &Operator, order_id: &str) -> ApiResult<Vec<ReservationView>> {
        self.settle(operator, order_id, Settlement::Consume)
    }

    /// 释放订单预留（退回可用池）
    pub fn release(&self, operator: &Operator, order_id: &str) -> ApiResult<Vec<ReservationView>> {
        self.settle(operator, order_id, Settlement::Release)
    }

    pub fn list_by_order(&self, operator: &Operator, order_id: &str) -> ApiResult<Vec<ReservationView>> {
        require_admin(operator)?;
        let order_id = Self::require_order_id(order_id)?;
        let rows = self.reservation_repo.list_by_order(order_id)?;
        Ok(rows.into_iter().map(ReservationView::from).collect())
    }

    fn settle(
        &self,
        operator: &Operator,
        order_id: &str,
        settlement: Settlement,
    ) -> ApiResult<Vec<ReservationView>> {
        require_admin(operator)?;
        let order_id = Self::require_order_id(order_id)?;

        let settled = self.reservation_repo.settle(order_id, settlement)?;
        if settled.is_empty() {
            info!(order_id = %order_id, settlement = settlement.as_str(), "订单无预留，跳过");
            return Ok(Vec::new());
        }

        let grams = total_grams(&settled);
        info!(
            order_id = %order_id,
            settlement = settlement.as_str(),
            rows = settled.len(),
            grams,
            actor = %operator.username,
            "结算预留"
        );
        let action_type = match settlement {
            Settlement::Consume => ActionType::ConsumeReservation,
            Settlement::Release => ActionType::ReleaseReservation,
        };
        self.audit.record(
            operator,
            action_type,
            order_id,
            json!({
                "settlement": settlement,
                "grams": grams,
                "skus": settled.iter().map(|r| r.filament_sku.as_str()).collect::<Vec<_>>(),
            }),
            format!("订单 {} {} {}g", order_id, settlement.as_str(), grams),
        );

        Ok(settled.into_iter().map(ReservationView::from).collect())
    }

    fn log_replay(order_id: &str, stored: &[FilamentReservation], lines: &[ReservationLine]) {
        if matches_request(stored, lines) {
            info!(order_id = %order_id, rows = stored.len(), "订单已有预留，返回既有记录");
        } else {
            warn!(
                order_id = %order_id,
                stored = stored.len(),
                requested = lines.len(),
                "订单已有预留且与本次请求不一致，返回既有记录"
            );
        }
    }

    fn require_order_id(order_id: &str) -> ApiResult<&str> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(ApiError::InvalidInput("订单ID不能为空".to_string()));
        }
        Ok(order_id)
    }
}
