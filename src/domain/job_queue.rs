// ==========================================
// 3D打印库存与排产系统 - 机台任务队列
// ==========================================
// 不变量: 队列中任务的 position 始终为 0..N-1 的连续序列
// position 由下标派生，所有变更原语（插入/删除/交换/移动）之后统一重排
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::MoveDirection;

// ==========================================
// MachineJob - 单个排队打印任务
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineJob {
    pub id: i64,
    pub machine_id: i64,
    pub sku: String,
    pub title: String,
    pub quantity: i64,
    pub est_minutes_per_unit: i64,
    pub remaining_minutes: i64, // 剩余时长覆盖值（>0 时优先）
    pub position: i64,          // 0-based
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl MachineJob {
    /// 有效剩余时长 (min)
    pub fn effective_minutes(&self) -> i64 {
        let mut value = self.remaining_minutes.max(0);
        if value <= 0 && self.est_minutes_per_unit > 0 {
            value = self
                .est_minutes_per_unit
                .saturating_mul(self.quantity.max(1));
        }
        value.max(0)
    }
}

// ==========================================
// JobQueue - 有序任务队列
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQueue {
    jobs: Vec<MachineJob>,
}

impl JobQueue {
    /// 由任意顺序的任务构建队列（按 position, id 排序后重排为连续序号）
    pub fn from_jobs(mut jobs: Vec<MachineJob>) -> Self {
        jobs.sort_by_key(|job| (job.position, job.id));
        let mut queue = Self { jobs };
        queue.renumber();
        queue
    }

    fn renumber(&mut self) {
        for (idx, job) in self.jobs.iter_mut().enumerate() {
            job.position = idx as i64;
        }
    }

    pub fn jobs(&self) -> &[MachineJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn index_of(&self, job_id: i64) -> Option<usize> {
        self.jobs.iter().position(|job| job.id == job_id)
    }

    pub fn get(&self, job_id: i64) -> Option<&MachineJob> {
        self.jobs.iter().find(|job| job.id == job_id)
    }

    /// 清空队列所需总时长 (min)
    pub fn eta_minutes(&self) -> i64 {
        self.jobs
            .iter()
            .map(MachineJob::effective_minutes)
            .fold(0i64, |acc, m| acc.saturating_add(m))
    }

    /// 追加到队尾
    pub fn push(&mut self, job: MachineJob) {
        self.jobs.push(job);
        self.renumber();
    }

    /// 移除任务
    pub fn remove(&mut self, job_id: i64) -> Option<MachineJob> {
        let idx = self.index_of(job_id)?;
        let job = self.jobs.remove(idx);
        self.renumber();
        Some(job)
    }

    /// 与相邻任务交换位置
    ///
    /// # 返回
    /// - None: 任务不在队列中
    /// - Some(false): 已在该方向的边界，无变化
    /// - Some(true): 已交换
    pub fn move_job(&mut self, job_id: i64, direction: MoveDirection) -> Option<bool> {
        let idx = self.index_of(job_id)?;
        let neighbor = match direction {
            MoveDirection::Up if idx > 0 => idx - 1,
            MoveDirection::Down if idx + 1 < self.jobs.len() => idx + 1,
            _ => return Some(false),
        };
        self.jobs.swap(idx, neighbor);
        self.renumber();
        Some(true)
    }

    /// 移动到指定位置（1-based，越界时夹到合法范围）
    ///
    /// # 返回
    /// - None: 任务不在队列中
    /// - Some(idx): 新的 0-based 位置
    pub fn set_position(&mut self, job_id: i64, position: i64) -> Option<usize> {
        let idx = self.index_of(job_id)?;
        let job = self.jobs.remove(idx);
        let target = (position.max(1) - 1).min(self.jobs.len() as i64) as usize;
        self.jobs.insert(target, job);
        self.renumber();
        Some(target)
    }

    /// (job_id, position) 列表，用于回写
    pub fn positions(&self) -> Vec<(i64, i64)> {
        self.jobs.iter().map(|job| (job.id, job.position)).collect()
    }

    pub fn job_ids(&self) -> Vec<i64> {
        self.jobs.iter().map(|job| job.id).collect()
    }
}
