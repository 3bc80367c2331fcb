// ==========================================
// 3D打印库存与排产系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod alert;
pub mod error;
pub mod filament;
pub mod job_queue;
pub mod machine;
pub mod reservation;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use alert::StockAlert;
pub use error::{DomainError, DomainResult};
pub use filament::{Filament, NewFilament};
pub use job_queue::{JobQueue, MachineJob};
pub use machine::{Machine, MachinePatch, NewJob, NewMachine};
pub use reservation::{FilamentReservation, ReservationLine, Settlement};
pub use types::{AlertKind, AlertLevel, MachineStatus, MoveDirection};
