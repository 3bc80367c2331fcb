// ==========================================
// 3D打印库存与排产系统 - 耗材 API
// ==========================================
// 职责: 耗材新建/查询/调整库存/补货点/删除
// 红线: 调整后 grams_available 不得低于 grams_reserved
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::audit::AuditTrail;
use crate::api::auth::{require_admin, Operator};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionType;
use crate::domain::filament::{Filament, NewFilament};
use crate::repository::filament_repo::FilamentRepository;
use crate::repository::RepositoryError;

// ==========================================
// 请求 / 响应 DTO
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFilamentRequest {
    pub sku: String,
    pub material: String,
    pub color: String,
    #[serde(default)]
    pub diameter: Option<f64>,
    #[serde(default)]
    pub grams_available: Option<i64>,
    #[serde(default)]
    pub grams_reserved: Option<i64>,
    #[serde(default)]
    pub reorder_point_grams: Option<i64>,
    #[serde(default)]
    pub grams_per_unit: Option<i64>,
    #[serde(default)]
    pub est_print_min_per_unit: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl From<CreateFilamentRequest> for NewFilament {
    fn from(req: CreateFilamentRequest) -> Self {
        NewFilament {
            external_id: req.external_id,
            sku: req.sku,
            material: req.material,
            color: req.color,
            diameter: req.diameter,
            grams_available: req.grams_available.unwrap_or(0),
            grams_reserved: req.grams_reserved.unwrap_or(0),
            reorder_point_grams: req.reorder_point_grams.unwrap_or(0),
            grams_per_unit: req.grams_per_unit.unwrap_or(0),
            est_print_min_per_unit: req.est_print_min_per_unit.unwrap_or(0),
            notes: req.notes.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilamentView {
    pub id: String, // 对外ID（友好ID或数值主键）
    pub pk: i64,
    pub external_id: Option<String>,
    pub sku: String,
    pub material: String,
    pub color: String,
    pub diameter: f64,
    pub grams_available: i64,
    pub grams_reserved: i64,
    pub free_grams: i64,
    pub reorder_point_grams: i64,
    pub needs_reorder: bool,
    pub grams_per_unit: i64,
    pub est_print_min_per_unit: i64,
    pub notes: String,
    pub updated_at: NaiveDateTime,
}

impl From<Filament> for FilamentView {
    fn from(f: Filament) -> Self {
        Self {
            id: f.public_id(),
            pk: f.id,
            free_grams: f.free_grams(),
            needs_reorder: f.needs_reorder(),
            external_id: f.external_id,
            sku: f.sku,
            material: f.material,
            color: f.color,
            diameter: f.diameter,
            grams_available: f.grams_available,
            grams_reserved: f.grams_reserved,
            reorder_point_grams: f.reorder_point_grams,
            grams_per_unit: f.grams_per_unit,
            est_print_min_per_unit: f.est_print_min_per_unit,
            notes: f.notes,
            updated_at: f.updated_at,
        }
    }
}

// ==========================================
// FilamentApi - 耗材 API
// ==========================================
pub struct FilamentApi {
    filament_repo: Arc<FilamentRepository>,
    audit: AuditTrail,
}

impl FilamentApi {
    pub fn new(filament_repo: Arc<FilamentRepository>, audit: AuditTrail) -> Self {
        Self {
            filament_repo,
            audit,
        }
    }

    /// 新建耗材
    ///
    /// # 失败
    /// - sku/material/color 缺失、数值为负、初始预留大于可用 → Validation
    /// - SKU 或友好ID 重复 → Validation
    pub fn create(&self, operator: &Operator, req: CreateFilamentRequest) -> ApiResult<FilamentView> {
        require_admin(operator)?;

        let input = NewFilament::from(req).normalized().map_err(|e| {
            warn!(error = %e, "新建耗材校验失败");
            ApiError::from(e)
        })?;
        let created = self.filament_repo.insert(&input)?;

        info!(
            sku = %created.sku,
            grams_available = created.grams_available,
            actor = %operator.username,
            "新建耗材"
        );
        self.audit.record(
            operator,
            ActionType::CreateFilament,
            &created.public_id(),
            json!({
                "sku": created.sku,
                "material": created.material,
                "color": created.color,
                "gramsAvailable": created.grams_available,
                "gramsReserved": created.grams_reserved,
            }),
            format!("新建耗材 {}", created.sku),
        );

        Ok(created.into())
    }

    /// 查询单个耗材（友好ID / 数值主键 / SKU）
    pub fn get(&self, operator: &Operator, identifier: &str) -> ApiResult<FilamentView> {
        require_admin(operator)?;
        Ok(self.lookup(identifier)?.into())
    }

    /// 全部耗材
    pub fn list(&self, operator: &Operator) -> ApiResult<Vec<FilamentView>> {
        require_admin(operator)?;
        let filaments = self.filament_repo.list_all()?;
        Ok(filaments.into_iter().map(FilamentView::from).collect())
    }

    /// 按增量调整可用库存
    pub fn adjust(&self, operator: &Operator, identifier: &str, delta: i64) -> ApiResult<FilamentView> {
        require_admin(operator)?;

        let filament = self.lookup(identifier)?;
        let before = filament.grams_available;
        let updated = self
            .filament_repo
            .adjust_available(filament.id, delta)
            .map_err(|e| {
                warn!(sku = %filament.sku, delta, error = %e, "库存调整被拒绝");
                ApiError::from(e)
            })?;

        info!(
            sku = %updated.sku,
            delta,
            before,
            after = updated.grams_available,
            actor = %operator.username,
            "调整耗材库存"
        );
        self.audit.record(
            operator,
            ActionType::AdjustFilament,
            &updated.public_id(),
            json!({
                "sku": updated.sku,
                "delta": delta,
                "before": before,
                "after": updated.grams_available,
            }),
            format!("调整库存 {} {:+}g", updated.sku, delta),
        );

        Ok(updated.into())
    }

    /// 设置补货点
    pub fn set_reorder_point(
        &self,
        operator: &Operator,
        identifier: &str,
        grams: i64,
    ) -> ApiResult<FilamentView> {
        require_admin(operator)?;

        let filament = self.lookup(identifier)?;
        let updated = self.filament_repo.set_reorder_point(filament.id, grams)?;

        info!(sku = %updated.sku, reorder_point_grams = grams, "更新补货点");
        self.audit.record(
            operator,
            ActionType::SetReorderPoint,
            &updated.public_id(),
            json!({
                "sku": updated.sku,
                "before": filament.reorder_point_grams,
                "after": grams,
            }),
            format!("补货点 {} → {}g", updated.sku, grams),
        );

        Ok(updated.into())
    }

    /// 删除耗材（仍有预留时拒绝）
    pub fn delete(&self, operator: &Operator, identifier: &str) -> ApiResult<()> {
        require_admin(operator)?;

        let filament = self.lookup(identifier)?;
        self.filament_repo.delete(filament.id)?;

        info!(sku = %filament.sku, actor = %operator.username, "删除耗材");
        self.audit.record(
            operator,
            ActionType::DeleteFilament,
            &filament.public_id(),
            json!({ "sku": filament.sku, "gramsAvailable": filament.grams_available }),
            format!("删除耗材 {}", filament.sku),
        );
        Ok(())
    }

    /// 友好ID → 数值主键 → SKU
    fn lookup(&self, identifier: &str) -> ApiResult<Filament> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ApiError::InvalidInput("耗材标识不能为空".to_string()));
        }

        match self.filament_repo.resolve(identifier) {
            Ok(found) => Ok(found),
            Err(RepositoryError::NotFound { .. }) => self
                .filament_repo
                .find_by_sku(identifier)?
                .ok_or_else(|| ApiError::NotFound(format!("耗材(id={})不存在", identifier))),
            Err(e) => Err(e.into()),
        }
    }
}
