// ==========================================
// 3D打印库存与排产系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 所有仓储共享同一个 SQLite 连接
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{AuditTrail, FilamentApi, MachineApi, ReservationApi, StockApi};
use crate::config::{ConfigManager, StockConfig};
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{
    ActionLogRepository, FilamentRepository, MachineRepository, ReservationRepository,
    StockRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "PRINT_STOCK_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 启动时加载的库存参数
    pub stock_config: StockConfig,

    /// 配置管理器（config_kv 读写）
    pub config_manager: Arc<ConfigManager>,

    /// 耗材API
    pub filament_api: Arc<FilamentApi>,

    /// 机台与队列API
    pub machine_api: Arc<MachineApi>,

    /// 预留API
    pub reservation_api: Arc<ReservationApi>,

    /// 总览 / ATP API
    pub stock_api: Arc<StockApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表（幂等）
    /// 2. 从 config_kv 读取库存参数
    /// 3. 初始化所有Repository与API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 从已建表的共享连接创建（测试使用内存库时走这里）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let stock_config = config_manager
            .load_stock_config()
            .map_err(|e| format!("读取库存参数失败: {}", e))?;
        tracing::info!(?stock_config, "库存参数已加载");

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let filament_repo = Arc::new(FilamentRepository::new(conn.clone()));
        let machine_repo = Arc::new(MachineRepository::new(conn.clone()));
        let reservation_repo = Arc::new(ReservationRepository::new(conn.clone()));
        let stock_repo = Arc::new(StockRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn));
        let audit = AuditTrail::new(action_log_repo);

        // ==========================================
        // 初始化API层
        // ==========================================
        let filament_api = Arc::new(FilamentApi::new(filament_repo, audit.clone()));
        let machine_api = Arc::new(MachineApi::new(machine_repo, audit.clone()));
        let reservation_api = Arc::new(ReservationApi::new(reservation_repo, audit.clone()));
        let stock_api = Arc::new(StockApi::new(stock_repo, audit, stock_config));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            stock_config,
            config_manager,
            filament_api,
            machine_api,
            reservation_api,
            stock_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 顺序: 环境变量 PRINT_STOCK_DB_PATH → 用户数据目录 → ./print_stock.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./print_stock.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("print-stock");
        match std::fs::create_dir_all(&dir) {
            Ok(()) => path = dir.join("print_stock.db"),
            Err(e) => tracing::warn!("无法创建数据目录 {}: {}，使用当前目录", dir.display(), e),
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_on_memory_db() {
        let conn = open_sqlite_connection(":memory:").unwrap();
        init_schema(&conn).unwrap();
        let state = AppState::from_connection(":memory:".to_string(), Arc::new(Mutex::new(conn)))
            .expect("AppState 初始化失败");

        assert_eq!(state.stock_config, StockConfig::default());
        assert_eq!(state.stock_api.config().atp_short_window_hours, 24);
    }
}
