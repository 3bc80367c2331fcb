// ==========================================
// 3D打印库存与排产系统 - API 层
// ==========================================
// 职责: 面向管理端的库存/排产操作（权限校验 → 输入校验 → 仓储 → 审计）
// 路由/会话由外部承载，这里只提供同步调用接口
// ==========================================

pub mod audit;
pub mod auth;
pub mod error;
pub mod filament_api;
pub mod machine_api;
pub mod reservation_api;
pub mod stock_api;

// 重导出核心类型
pub use audit::AuditTrail;
pub use auth::{require_admin, Operator};
pub use error::{ApiError, ApiResult, ErrorKind, ErrorResponse};
pub use filament_api::{CreateFilamentRequest, FilamentApi, FilamentView};
pub use machine_api::{
    CreateMachineRequest, EnqueueJobRequest, JobView, MachineApi, MachineView,
    UpdateMachineRequest,
};
pub use reservation_api::{ReservationApi, ReservationView, ReserveItem, ReserveRequest};
pub use stock_api::{StockApi, StockSnapshot};
