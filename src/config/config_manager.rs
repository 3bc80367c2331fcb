// ==========================================
// 3D打印库存与排产系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::stock_config::{
    StockConfig, DEFAULT_ATP_FALLBACK_GRAMS_PER_UNIT, DEFAULT_ATP_FALLBACK_MINUTES_PER_UNIT,
    DEFAULT_ATP_LONG_WINDOW_HOURS, DEFAULT_ATP_SHORT_WINDOW_HOURS, DEFAULT_MAINTENANCE_ALERT_RATIO,
};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let key = key.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取配置并解析；缺失用默认值，格式错误或越界时告警并回退默认值
    fn get_parsed_or_default<T>(
        &self,
        key: &str,
        default: T,
        is_valid: impl Fn(&T) -> bool,
    ) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        let raw = match self.get_config_value(key)? {
            Some(raw) => raw,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(value) if is_valid(&value) => Ok(value),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值无效，使用默认值"
                );
                Ok(default)
            }
        }
    }

    // ===== 库存 / 排产参数 =====

    /// 组装 StockConfig
    pub fn load_stock_config(&self) -> Result<StockConfig, Box<dyn Error>> {
        Ok(StockConfig {
            maintenance_alert_ratio: self.get_parsed_or_default(
                config_keys::MAINTENANCE_ALERT_RATIO,
                DEFAULT_MAINTENANCE_ALERT_RATIO,
                |v: &f64| v.is_finite() && *v > 0.0,
            )?,
            atp_short_window_hours: self.get_parsed_or_default(
                config_keys::ATP_SHORT_WINDOW_HOURS,
                DEFAULT_ATP_SHORT_WINDOW_HOURS,
                |v: &i64| *v >= 0,
            )?,
            atp_long_window_hours: self.get_parsed_or_default(
                config_keys::ATP_LONG_WINDOW_HOURS,
                DEFAULT_ATP_LONG_WINDOW_HOURS,
                |v: &i64| *v >= 0,
            )?,
            atp_fallback_grams_per_unit: self.get_parsed_or_default(
                config_keys::ATP_FALLBACK_GRAMS_PER_UNIT,
                DEFAULT_ATP_FALLBACK_GRAMS_PER_UNIT,
                |v: &i64| *v > 0,
            )?,
            atp_fallback_minutes_per_unit: self.get_parsed_or_default(
                config_keys::ATP_FALLBACK_MINUTES_PER_UNIT,
                DEFAULT_ATP_FALLBACK_MINUTES_PER_UNIT,
                |v: &i64| *v > 0,
            )?,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 告警
    pub const MAINTENANCE_ALERT_RATIO: &str = "maintenance_alert_ratio";

    // ATP
    pub const ATP_SHORT_WINDOW_HOURS: &str = "atp_short_window_hours";
    pub const ATP_LONG_WINDOW_HOURS: &str = "atp_long_window_hours";
    pub const ATP_FALLBACK_GRAMS_PER_UNIT: &str = "atp_fallback_grams_per_unit";
    pub const ATP_FALLBACK_MINUTES_PER_UNIT: &str = "atp_fallback_minutes_per_unit";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup_manager() -> ConfigManager {
        let conn = open_sqlite_connection(":memory:").unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let manager = setup_manager();
        assert_eq!(manager.load_stock_config().unwrap(), StockConfig::default());
    }

    #[test]
    fn test_override_and_fallback() {
        let manager = setup_manager();
        manager
            .set_global_value(config_keys::MAINTENANCE_ALERT_RATIO, "0.75")
            .unwrap();
        manager
            .set_global_value(config_keys::ATP_SHORT_WINDOW_HOURS, "abc")
            .unwrap();
        manager
            .set_global_value(config_keys::ATP_FALLBACK_MINUTES_PER_UNIT, "0")
            .unwrap();

        let config = manager.load_stock_config().unwrap();
        assert_eq!(config.maintenance_alert_ratio, 0.75);
        assert_eq!(config.atp_short_window_hours, DEFAULT_ATP_SHORT_WINDOW_HOURS);
        assert_eq!(
            config.atp_fallback_minutes_per_unit,
            DEFAULT_ATP_FALLBACK_MINUTES_PER_UNIT
        );
    }

    #[test]
    fn test_set_overwrites_and_snapshot() {
        let manager = setup_manager();
        manager.set_global_value("atp_long_window_hours", "48").unwrap();
        manager.set_global_value("atp_long_window_hours", "96").unwrap();

        assert_eq!(
            manager.get_global_value("atp_long_window_hours").unwrap(),
            Some("96".to_string())
        );

        let snapshot: serde_json::Value =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot["atp_long_window_hours"], "96");
        assert!(manager.set_global_value("  ", "x").is_err());
    }
}
