// ==========================================
// 3D打印库存与排产系统 - 机台领域模型
// ==========================================
// 派生: maintenance_ratio = hours_used / interval (interval=0 时为0)
//       queue_eta_minutes = Σ 队列任务 effective_minutes
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::job_queue::JobQueue;
use crate::domain::types::{MachineStatus, MoveDirection};

/// 默认维护间隔 (h)
pub const DEFAULT_MAINTENANCE_EVERY_HOURS: i64 = 120;

/// 速度系数下限
pub const MIN_SPEED_FACTOR: f64 = 0.10;

// ==========================================
// Machine - 打印机台
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub model: String,
    pub status: MachineStatus,
    pub nozzle: String,
    pub avg_speed_factor: f64,
    pub maintenance_every_hours: i64,
    pub maintenance_hours_used: i64,
    pub last_maintenance_at: Option<NaiveDateTime>,
    pub compatible_materials: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub queue: JobQueue,
}

impl Machine {
    pub fn maintenance_ratio(&self) -> f64 {
        if self.maintenance_every_hours <= 0 {
            return 0.0;
        }
        self.maintenance_hours_used as f64 / self.maintenance_every_hours as f64
    }

    pub fn queue_eta_minutes(&self) -> i64 {
        self.queue.eta_minutes()
    }

    pub fn is_online(&self) -> bool {
        self.status == MachineStatus::Online
    }

    /// 是否兼容指定材料（忽略大小写与首尾空白）
    pub fn supports_material(&self, material: &str) -> bool {
        let wanted = material.trim();
        !wanted.is_empty()
            && self
                .compatible_materials
                .iter()
                .any(|m| m.trim().eq_ignore_ascii_case(wanted))
    }

    /// 时间窗口内的剩余产能（已按速度系数折算）
    pub fn spare_minutes(&self, window_hours: i64) -> f64 {
        let window_minutes = window_hours.max(0).saturating_mul(60);
        let spare = window_minutes.saturating_sub(self.queue_eta_minutes()).max(0);
        spare as f64 * self.avg_speed_factor
    }

    /// 登记维护：清零已用工时、记录时间、状态回到 online
    pub fn register_maintenance(&mut self, now: NaiveDateTime) {
        self.maintenance_hours_used = 0;
        self.last_maintenance_at = Some(now);
        self.status = MachineStatus::Online;
        self.updated_at = now;
    }

    /// 累加运行工时
    pub fn record_usage(&mut self, hours: i64) -> DomainResult<()> {
        if hours < 0 {
            return Err(DomainError::InvalidField {
                field: "hours",
                message: format!("工时不能为负数: {}", hours),
            });
        }
        self.maintenance_hours_used = self.maintenance_hours_used.saturating_add(hours);
        Ok(())
    }

    pub fn move_job(&mut self, job_id: i64, direction: MoveDirection) -> DomainResult<bool> {
        self.queue
            .move_job(job_id, direction)
            .ok_or_else(|| self.job_not_found(job_id))
    }

    pub fn set_job_position(&mut self, job_id: i64, position: i64) -> DomainResult<usize> {
        self.queue
            .set_position(job_id, position)
            .ok_or_else(|| self.job_not_found(job_id))
    }

    fn job_not_found(&self, job_id: i64) -> DomainError {
        DomainError::JobNotInQueue {
            machine: self.identifier.clone(),
            job_id,
        }
    }
}

// ==========================================
// NewMachine / MachinePatch - 新建与局部更新输入
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct NewMachine {
    pub identifier: String,
    pub name: String,
    pub model: String,
    pub nozzle: String,
    pub status: MachineStatus,
    pub avg_speed_factor: Option<f64>,
    pub maintenance_every_hours: Option<i64>,
    pub maintenance_hours_used: Option<i64>,
    pub compatible_materials: Vec<String>,
}

impl NewMachine {
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.identifier = self.identifier.trim().to_string();
        if self.identifier.is_empty() {
            return Err(DomainError::MissingField("identifier"));
        }
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            self.name = self.identifier.clone();
        }

        let speed = self.avg_speed_factor.unwrap_or(1.0);
        validate_speed_factor(speed)?;
        self.avg_speed_factor = Some(speed);

        let every = self
            .maintenance_every_hours
            .unwrap_or(DEFAULT_MAINTENANCE_EVERY_HOURS);
        validate_non_negative("maintenanceEveryHours", every)?;
        self.maintenance_every_hours = Some(every);

        let used = self.maintenance_hours_used.unwrap_or(0);
        validate_non_negative("maintenanceHoursUsed", used)?;
        self.maintenance_hours_used = Some(used);

        self.compatible_materials = normalize_materials(self.compatible_materials);
        Ok(self)
    }
}

/// 局部更新：仅覆盖提供的字段
#[derive(Debug, Clone, Default)]
pub struct MachinePatch {
    pub name: Option<String>,
    pub model: Option<String>,
    pub nozzle: Option<String>,
    pub status: Option<MachineStatus>,
    pub avg_speed_factor: Option<f64>,
    pub maintenance_every_hours: Option<i64>,
    pub maintenance_hours_used: Option<i64>,
    pub compatible_materials: Option<Vec<String>>,
}

impl MachinePatch {
    /// 先整体校验，再逐字段覆盖（校验失败时机台保持不变）
    pub fn apply(self, machine: &mut Machine) -> DomainResult<()> {
        if let Some(speed) = self.avg_speed_factor {
            validate_speed_factor(speed)?;
        }
        if let Some(every) = self.maintenance_every_hours {
            validate_non_negative("maintenanceEveryHours", every)?;
        }
        if let Some(used) = self.maintenance_hours_used {
            validate_non_negative("maintenanceHoursUsed", used)?;
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::MissingField("name"));
            }
        }

        if let Some(name) = self.name {
            machine.name = name.trim().to_string();
        }
        if let Some(model) = self.model {
            machine.model = model.trim().to_string();
        }
        if let Some(nozzle) = self.nozzle {
            machine.nozzle = nozzle.trim().to_string();
        }
        if let Some(status) = self.status {
            machine.status = status;
        }
        if let Some(speed) = self.avg_speed_factor {
            machine.avg_speed_factor = speed;
        }
        if let Some(every) = self.maintenance_every_hours {
            machine.maintenance_every_hours = every;
        }
        if let Some(used) = self.maintenance_hours_used {
            machine.maintenance_hours_used = used;
        }
        if let Some(materials) = self.compatible_materials {
            machine.compatible_materials = normalize_materials(materials);
        }
        Ok(())
    }
}

// ==========================================
// NewJob - 新建队列任务
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub sku: String,
    pub title: String,
    pub quantity: i64,
    pub est_minutes_per_unit: i64,
    pub remaining_minutes: i64,
}

impl NewJob {
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.sku = self.sku.trim().to_string();
        self.title = self.title.trim().to_string();
        if self.quantity < 1 {
            return Err(DomainError::InvalidField {
                field: "qty",
                message: format!("件数必须≥1: {}", self.quantity),
            });
        }
        validate_non_negative("estMinutesPerUnit", self.est_minutes_per_unit)?;
        validate_non_negative("remainingMinutes", self.remaining_minutes)?;
        Ok(self)
    }
}

fn validate_speed_factor(speed: f64) -> DomainResult<()> {
    if !speed.is_finite() || speed < MIN_SPEED_FACTOR {
        return Err(DomainError::InvalidField {
            field: "avgSpeedFactor",
            message: format!("速度系数必须≥{}: {}", MIN_SPEED_FACTOR, speed),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: i64) -> DomainResult<()> {
    if value < 0 {
        return Err(DomainError::InvalidField {
            field,
            message: format!("不能为负数: {}", value),
        });
    }
    Ok(())
}

fn normalize_materials(materials: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(materials.len());
    for m in materials {
        let m = m.trim().to_string();
        if !m.is_empty() && !out.iter().any(|x| x.eq_ignore_ascii_case(&m)) {
            out.push(m);
        }
    }
    out
}
