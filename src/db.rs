// ==========================================
// 3D打印库存与排产系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表，保证各仓储看到同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（machine_job / filament_reservation 级联删除依赖它）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
          scope_id TEXT NOT NULL DEFAULT 'global',
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now')),
          PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS filament (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          external_id TEXT UNIQUE,
          sku TEXT NOT NULL UNIQUE,
          material TEXT NOT NULL,
          color TEXT NOT NULL,
          diameter REAL NOT NULL DEFAULT 1.75,
          grams_available INTEGER NOT NULL DEFAULT 0 CHECK (grams_available >= 0),
          grams_reserved INTEGER NOT NULL DEFAULT 0 CHECK (grams_reserved >= 0),
          reorder_point_grams INTEGER NOT NULL DEFAULT 0,
          grams_per_unit INTEGER NOT NULL DEFAULT 0,
          est_print_min_per_unit INTEGER NOT NULL DEFAULT 0,
          notes TEXT NOT NULL DEFAULT '',
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          CHECK (grams_reserved <= grams_available)
        );

        CREATE TABLE IF NOT EXISTS machine (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          identifier TEXT NOT NULL UNIQUE,
          name TEXT NOT NULL,
          model TEXT NOT NULL DEFAULT '',
          status TEXT NOT NULL DEFAULT 'online',
          nozzle TEXT NOT NULL DEFAULT '',
          avg_speed_factor REAL NOT NULL DEFAULT 1.0,
          maintenance_every_hours INTEGER NOT NULL DEFAULT 120,
          maintenance_hours_used INTEGER NOT NULL DEFAULT 0,
          last_maintenance_at TEXT,
          compatible_materials TEXT NOT NULL DEFAULT '[]',
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS machine_job (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          machine_id INTEGER NOT NULL REFERENCES machine(id) ON DELETE CASCADE,
          sku TEXT NOT NULL DEFAULT '',
          title TEXT NOT NULL DEFAULT '',
          quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
          est_minutes_per_unit INTEGER NOT NULL DEFAULT 0,
          remaining_minutes INTEGER NOT NULL DEFAULT 0,
          position INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_machine_job_machine
          ON machine_job(machine_id, position);

        CREATE TABLE IF NOT EXISTS filament_reservation (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          order_id TEXT NOT NULL,
          filament_id INTEGER NOT NULL REFERENCES filament(id) ON DELETE CASCADE,
          grams INTEGER NOT NULL CHECK (grams > 0),
          metadata TEXT NOT NULL DEFAULT '{}',
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          UNIQUE(order_id, filament_id)
        );
        CREATE INDEX IF NOT EXISTS idx_reservation_order
          ON filament_reservation(order_id);

        CREATE TABLE IF NOT EXISTS action_log (
          action_id TEXT PRIMARY KEY,
          action_type TEXT NOT NULL,
          action_ts TEXT NOT NULL,
          actor TEXT NOT NULL,
          target TEXT,
          payload_json TEXT,
          detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_ts
          ON action_log(action_ts DESC);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
