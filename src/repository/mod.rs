// ==========================================
// 3D打印库存与排产系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务规则（规则在 domain 层）
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
//       多行变更使用 IMMEDIATE 事务
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod filament_repo;
pub mod machine_repo;
pub mod reservation_repo;
pub mod stock_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use filament_repo::FilamentRepository;
pub use machine_repo::MachineRepository;
pub use reservation_repo::{ReservationRepository, ReserveBatch};
pub use stock_repo::{StockRepository, StockRows};
