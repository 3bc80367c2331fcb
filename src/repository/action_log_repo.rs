// ==========================================
// 3D打印库存与排产系统 - 操作日志数据仓储
// ==========================================
// 依据: action_log 表
// 红线: 所有管理写操作都应留痕（写日志失败不影响主操作）
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
