// ==========================================
// 3D打印库存与排产系统 - 应用层
// ==========================================
// 职责: 装配仓储与API，供命令行/外部服务调用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
