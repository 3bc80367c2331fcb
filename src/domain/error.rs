// ==========================================
// 3D打印库存与排产系统 - 领域规则错误
// ==========================================
// 纯规则校验失败（不涉及数据访问）
// ==========================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("缺少必填字段: {0}")]
    MissingField(&'static str),

    #[error("字段值错误 (field={field}): {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("库存不能低于已预留量: sku={sku}, 调整后可用={new_available}g, 已预留={reserved}g")]
    StockBelowReservations {
        sku: String,
        new_available: i64,
        reserved: i64,
    },

    #[error("耗材库存不足: sku={sku}, 需要={needed}g, 可用={free}g")]
    InsufficientStock { sku: String, needed: i64, free: i64 },

    #[error("耗材未配置单件用量: sku={sku}")]
    ConsumptionNormMissing { sku: String },

    #[error("任务不在机台队列中: machine={machine}, job_id={job_id}")]
    JobNotInQueue { machine: String, job_id: i64 },
}

pub type DomainResult<T> = Result<T, DomainError>;
