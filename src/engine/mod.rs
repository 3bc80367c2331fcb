// ==========================================
// 3D打印库存与排产系统 - 引擎层
// ==========================================
// 职责: 只读计算（ATP 估算、告警），不拼 SQL
// 红线: Engine 不修改状态
// ==========================================

pub mod alerts;
pub mod atp;

// 重导出核心引擎
pub use alerts::AlertEngine;
pub use atp::{AtpEstimate, AtpEstimator};
