// ==========================================
// 3D打印库存与排产系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 范围: 耗材账本 / 预留账本 / 机台队列 / 可承诺量 (ATP)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与纯规则
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 只读计算
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 管理端接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AlertKind, AlertLevel, MachineStatus, MoveDirection};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Filament, FilamentReservation, JobQueue, Machine, MachineJob,
    StockAlert,
};

// 引擎
pub use engine::{AlertEngine, AtpEstimate, AtpEstimator};

// API
pub use api::{FilamentApi, MachineApi, ReservationApi, StockApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "3D打印库存与排产系统";
