// ==========================================
// 3D打印库存与排产系统 - 机台与队列 API
// ==========================================
// 职责: 机台登记/更新/删除、维护登记、工时累计、队列任务管理
// 红线: 队列重排后 position 恒为 0..N-1 连续序列
// ==========================================

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::audit::AuditTrail;
use crate::api::auth::{require_admin, Operator};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionType;
use crate::domain::job_queue::MachineJob;
use crate::domain::machine::{Machine, MachinePatch, NewJob, NewMachine};
use crate::domain::types::{MachineStatus, MoveDirection};
use crate::repository::machine_repo::MachineRepository;

// ==========================================
// 请求 DTO
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMachineRequest {
    pub identifier: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub nozzle: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub avg_speed_factor: Option<f64>,
    #[serde(default)]
    pub maintenance_every_hours: Option<i64>,
    #[serde(default)]
    pub maintenance_hours_used: Option<i64>,
    #[serde(default)]
    pub compatible_materials: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMachineRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub nozzle: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub avg_speed_factor: Option<f64>,
    #[serde(default)]
    pub maintenance_every_hours: Option<i64>,
    #[serde(default)]
    pub maintenance_hours_used: Option<i64>,
    #[serde(default)]
    pub compatible_materials: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueJobRequest {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub title: String,
    pub qty: i64,
    #[serde(default)]
    pub est_minutes_per_unit: Option<i64>,
    #[serde(default)]
    pub remaining_minutes: Option<i64>,
}

// ==========================================
// 响应 DTO
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: i64,
    pub sku: String,
    pub title: String,
    pub qty: i64,
    pub est_minutes_per_unit: i64,
    pub remaining_minutes: i64,
    pub effective_minutes: i64,
    pub position: i64,
}

impl From<&MachineJob> for JobView {
    fn from(job: &MachineJob) -> Self {
        Self {
            id: job.id,
            sku: job.sku.clone(),
            title: job.title.clone(),
            qty: job.quantity,
            est_minutes_per_unit: job.est_minutes_per_unit,
            remaining_minutes: job.remaining_minutes,
            effective_minutes: job.effective_minutes(),
            position: job.position,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineView {
    pub id: String,
    pub pk: i64,
    pub name: String,
    pub model: String,
    pub status: MachineStatus,
    pub nozzle: String,
    pub avg_speed_factor: f64,
    pub maintenance_every_hours: i64,
    pub maintenance_hours_used: i64,
    pub maintenance_ratio: f64,
    pub last_maintenance_at: Option<NaiveDateTime>,
    pub compatible_materials: Vec<String>,
    pub queue_eta_minutes: i64,
    pub queue: Vec<JobView>,
}

impl From<&Machine> for MachineView {
    fn from(m: &Machine) -> Self {
        Self {
            id: m.identifier.clone(),
            pk: m.id,
            name: m.name.clone(),
            model: m.model.clone(),
            status: m.status,
            nozzle: m.nozzle.clone(),
            avg_speed_factor: m.avg_speed_factor,
            maintenance_every_hours: m.maintenance_every_hours,
            maintenance_hours_used: m.maintenance_hours_used,
            maintenance_ratio: m.maintenance_ratio(),
            last_maintenance_at: m.last_maintenance_at,
            compatible_materials: m.compatible_materials.clone(),
            queue_eta_minutes: m.queue_eta_minutes(),
            queue: m.queue.jobs().iter().map(JobView::from).collect(),
        }
    }
}

/// 宽松解析状态：无法识别时记录告警并返回 None
fn parse_status(raw: Option<&str>, machine: &str) -> Option<MachineStatus> {
    let raw = raw?;
    let parsed = MachineStatus::parse_lenient(raw);
    if parsed.is_none() {
        warn!(machine = machine, status = raw, "机台状态无法识别，已忽略");
    }
    parsed
}

// ==========================================
// MachineApi - 机台与队列 API
// ==========================================
pub struct MachineApi {
    machine_repo: Arc<MachineRepository>,
    audit: AuditTrail,
}

impl MachineApi {
    pub fn new(machine_repo: Arc<MachineRepository>, audit: AuditTrail) -> Self {
        Self {
            machine_repo,
            audit,
        }
    }

    // ==========================================
    // 机台
    // ==========================================

    /// 登记机台
    ///
    /// 状态缺省或无法识别时为 online；名称为空时取 identifier
    pub fn create(&self, operator: &Operator, req: CreateMachineRequest) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let status = parse_status(req.status.as_deref(), &req.identifier).unwrap_or_default();
        let input = NewMachine {
            identifier: req.identifier,
            name: req.name.unwrap_or_default(),
            model: req.model.unwrap_or_default(),
            nozzle: req.nozzle.unwrap_or_default(),
            status,
            avg_speed_factor: req.avg_speed_factor,
            maintenance_every_hours: req.maintenance_every_hours,
            maintenance_hours_used: req.maintenance_hours_used,
            compatible_materials: req.compatible_materials.unwrap_or_default(),
        }
        .normalized()?;

        let created = self.machine_repo.insert(&input)?;

        info!(
            machine = %created.identifier,
            status = %created.status,
            actor = %operator.username,
            "登记机台"
        );
        self.audit.record(
            operator,
            ActionType::CreateMachine,
            &created.identifier,
            json!({
                "identifier": created.identifier,
                "status": created.status.as_str(),
                "compatibleMaterials": created.compatible_materials,
            }),
            format!("登记机台 {}", created.identifier),
        );

        Ok(MachineView::from(&created))
    }

    pub fn get(&self, operator: &Operator, identifier: &str) -> ApiResult<MachineView> {
        require_admin(operator)?;
        Ok(MachineView::from(&self.lookup(identifier)?))
    }

    pub fn list(&self, operator: &Operator) -> ApiResult<Vec<MachineView>> {
        require_admin(operator)?;
        let machines = self.machine_repo.list_all()?;
        Ok(machines.iter().map(MachineView::from).collect())
    }

    /// 局部更新：只覆盖提供的字段；状态无法识别时忽略该字段
    pub fn update(
        &self,
        operator: &Operator,
        identifier: &str,
        req: UpdateMachineRequest,
    ) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let machine = self.lookup(identifier)?;
        let patch = MachinePatch {
            status: parse_status(req.status.as_deref(), &machine.identifier),
            name: req.name,
            model: req.model,
            nozzle: req.nozzle,
            avg_speed_factor: req.avg_speed_factor,
            maintenance_every_hours: req.maintenance_every_hours,
            maintenance_hours_used: req.maintenance_hours_used,
            compatible_materials: req.compatible_materials,
        };
        let payload = json!({
            "name": patch.name,
            "model": patch.model,
            "nozzle": patch.nozzle,
            "status": patch.status.map(|s| s.as_str()),
            "avgSpeedFactor": patch.avg_speed_factor,
            "maintenanceEveryHours": patch.maintenance_every_hours,
            "maintenanceHoursUsed": patch.maintenance_hours_used,
            "compatibleMaterials": patch.compatible_materials,
        });

        let (updated, before_status) = self.machine_repo.mutate_machine(machine.id, |m| {
            let before = m.status;
            patch.apply(m)?;
            Ok(before)
        })?;

        info!(
            machine = %updated.identifier,
            from = %before_status,
            to = %updated.status,
            "更新机台"
        );
        self.audit.record(
            operator,
            ActionType::UpdateMachine,
            &updated.identifier,
            payload,
            format!("更新机台 {}", updated.identifier),
        );

        Ok(MachineView::from(&updated))
    }

    /// 删除机台（队列任务一并删除）
    pub fn delete(&self, operator: &Operator, identifier: &str) -> ApiResult<()> {
        require_admin(operator)?;

        let machine = self.lookup(identifier)?;
        self.machine_repo.delete(machine.id)?;

        info!(machine = %machine.identifier, jobs = machine.queue.len(), "删除机台");
        self.audit.record(
            operator,
            ActionType::DeleteMachine,
            &machine.identifier,
            json!({ "identifier": machine.identifier, "jobs": machine.queue.job_ids() }),
            format!("删除机台 {}", machine.identifier),
        );
        Ok(())
    }

    /// 登记维护: 已用工时清零、记录时间、状态回到 online
    pub fn register_maintenance(&self, operator: &Operator, identifier: &str) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let machine = self.lookup(identifier)?;
        let (updated, (hours_before, status_before)) =
            self.machine_repo.mutate_machine(machine.id, |m| {
                let before = (m.maintenance_hours_used, m.status);
                m.register_maintenance(Local::now().naive_local());
                Ok(before)
            })?;

        info!(
            machine = %updated.identifier,
            hours_before,
            from = %status_before,
            "登记维护"
        );
        self.audit.record(
            operator,
            ActionType::RegisterMaintenance,
            &updated.identifier,
            json!({
                "hoursBefore": hours_before,
                "statusBefore": status_before.as_str(),
                "lastMaintenanceAt": updated.last_maintenance_at,
            }),
            format!("登记维护 {}", updated.identifier),
        );

        Ok(MachineView::from(&updated))
    }

    /// 累计运行工时
    pub fn record_usage(&self, operator: &Operator, identifier: &str, hours: i64) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let machine = self.lookup(identifier)?;
        let (updated, ()) = self
            .machine_repo
            .mutate_machine(machine.id, |m| m.record_usage(hours))?;

        info!(
            machine = %updated.identifier,
            hours,
            hours_used = updated.maintenance_hours_used,
            ratio = updated.maintenance_ratio(),
            "累计运行工时"
        );
        self.audit.record(
            operator,
            ActionType::RecordUsage,
            &updated.identifier,
            json!({ "hours": hours, "hoursUsed": updated.maintenance_hours_used }),
            format!("累计工时 {} +{}h", updated.identifier, hours),
        );

        Ok(MachineView::from(&updated))
    }

    // ==========================================
    // 队列
    // ==========================================

    /// 追加任务到队尾
    pub fn enqueue_job(
        &self,
        operator: &Operator,
        identifier: &str,
        req: EnqueueJobRequest,
    ) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let machine = self.lookup(identifier)?;
        let job = NewJob {
            sku: req.sku,
            title: req.title,
            quantity: req.qty,
            est_minutes_per_unit: req.est_minutes_per_unit.unwrap_or(0),
            remaining_minutes: req.remaining_minutes.unwrap_or(0),
        }
        .normalized()?;

        let created = self.machine_repo.insert_job(machine.id, &job)?;
        let updated = self.reload(&machine)?;

        info!(
            machine = %machine.identifier,
            job_id = created.id,
            position = created.position,
            eta_minutes = updated.queue_eta_minutes(),
            "任务入队"
        );
        self.audit.record(
            operator,
            ActionType::EnqueueJob,
            &machine.identifier,
            json!({
                "jobId": created.id,
                "sku": created.sku,
                "qty": created.quantity,
                "position": created.position,
            }),
            format!("任务入队 {} #{}", machine.identifier, created.id),
        );

        Ok(MachineView::from(&updated))
    }

    /// 完成/取消任务：移出队列并重排
    pub fn complete_job(&self, operator: &Operator, identifier: &str, job_id: i64) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let machine = self.lookup(identifier)?;
        let (updated, removed) = self.machine_repo.delete_job(machine.id, job_id)?;

        info!(
            machine = %updated.identifier,
            job_id,
            remaining = updated.queue.len(),
            "任务出队"
        );
        self.audit.record(
            operator,
            ActionType::CompleteJob,
            &updated.identifier,
            json!({ "jobId": removed.id, "sku": removed.sku, "position": removed.position }),
            format!("任务出队 {} #{}", updated.identifier, removed.id),
        );

        Ok(MachineView::from(&updated))
    }

    /// 与相邻任务交换位置（已在边界时不变）
    pub fn move_job(
        &self,
        operator: &Operator,
        identifier: &str,
        job_id: i64,
        direction: &str,
    ) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let direction: MoveDirection = direction.parse().map_err(ApiError::InvalidInput)?;
        let machine = self.lookup(identifier)?;
        let (updated, moved) = self
            .machine_repo
            .mutate_queue(machine.id, |m| m.move_job(job_id, direction))?;

        if moved {
            info!(machine = %updated.identifier, job_id, direction = %direction, "任务移动");
            self.audit.record(
                operator,
                ActionType::ReorderJob,
                &updated.identifier,
                json!({ "jobId": job_id, "direction": direction, "order": updated.queue.job_ids() }),
                format!("任务移动 {} #{} {}", updated.identifier, job_id, direction),
            );
        } else {
            info!(machine = %updated.identifier, job_id, direction = %direction, "任务已在队列边界，无变化");
        }

        Ok(MachineView::from(&updated))
    }

    /// 移动到指定位置（1-based，越界夹到首/尾）
    pub fn set_job_position(
        &self,
        operator: &Operator,
        identifier: &str,
        job_id: i64,
        position: i64,
    ) -> ApiResult<MachineView> {
        require_admin(operator)?;

        let machine = self.lookup(identifier)?;
        let (updated, index) = self
            .machine_repo
            .mutate_queue(machine.id, |m| m.set_job_position(job_id, position))?;

        info!(
            machine = %updated.identifier,
            job_id,
            requested = position,
            position = index,
            "任务定位"
        );
        self.audit.record(
            operator,
            ActionType::ReorderJob,
            &updated.identifier,
            json!({
                "jobId": job_id,
                "requested": position,
                "position": index,
                "order": updated.queue.job_ids(),
            }),
            format!("任务定位 {} #{} → {}", updated.identifier, job_id, index + 1),
        );

        Ok(MachineView::from(&updated))
    }

    fn lookup(&self, identifier: &str) -> ApiResult<Machine> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ApiError::InvalidInput("机台标识不能为空".to_string()));
        }
        Ok(self.machine_repo.resolve(identifier)?)
    }

    fn reload(&self, machine: &Machine) -> ApiResult<Machine> {
        self.machine_repo
            .find_by_id(machine.id)?
            .ok_or_else(|| ApiError::NotFound(format!("机台(id={})不存在", machine.identifier)))
    }
}
