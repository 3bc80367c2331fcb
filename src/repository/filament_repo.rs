// ==========================================
// 3D打印库存与排产系统 - 耗材仓储
// ==========================================
// 职责: filament 表的读写
// 约束: 调整库存在 IMMEDIATE 事务内完成读-改-写
// ==========================================

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

use crate::domain::filament::{Filament, NewFilament, DEFAULT_DIAMETER_MM};
use crate::repository::error::{RepositoryError, RepositoryResult};

pub(crate) const FILAMENT_COLUMNS: &str = r#"
    id, external_id, sku, material, color, diameter,
    grams_available, grams_reserved, reorder_point_grams,
    grams_per_unit, est_print_min_per_unit, notes,
    created_at, updated_at
"#;

pub(crate) fn map_filament_row(row: &Row<'_>) -> rusqlite::Result<Filament> {
    Ok(Filament {
        id: row.get(0)?,
        external_id: row.get(1)?,
        sku: row.get(2)?,
        material: row.get(3)?,
        color: row.get(4)?,
        diameter: row.get(5)?,
        grams_available: row.get(6)?,
        grams_reserved: row.get(7)?,
        reorder_point_grams: row.get(8)?,
        grams_per_unit: row.get(9)?,
        est_print_min_per_unit: row.get(10)?,
        notes: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// 按主键读取（可在事务内调用）
pub(crate) fn load_filament_by_id(conn: &Connection, id: i64) -> RepositoryResult<Option<Filament>> {
    let sql = format!("SELECT {} FROM filament WHERE id = ?1", FILAMENT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], map_filament_row).optional()?)
}

/// 按 SKU 读取（可在事务内调用）
pub(crate) fn load_filament_by_sku(conn: &Connection, sku: &str) -> RepositoryResult<Option<Filament>> {
    let sql = format!("SELECT {} FROM filament WHERE sku = ?1", FILAMENT_COLUMNS);
    Ok(conn.query_row(&sql, params![sku], map_filament_row).optional()?)
}

/// 全部耗材（按 材料/颜色/SKU 排序；可在事务内调用）
pub(crate) fn load_all_filaments(conn: &Connection) -> RepositoryResult<Vec<Filament>> {
    let sql = format!(
        "SELECT {} FROM filament ORDER BY material ASC, color ASC, sku ASC",
        FILAMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_filament_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// 同一 SKU 的全部批次（ATP 聚合使用；可在事务内调用）
pub(crate) fn load_filaments_by_sku(conn: &Connection, sku: &str) -> RepositoryResult<Vec<Filament>> {
    let sql = format!("SELECT {} FROM filament WHERE sku = ?1 ORDER BY id ASC", FILAMENT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![sku], map_filament_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ==========================================
// FilamentRepository - 耗材仓储
// ==========================================
pub struct FilamentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FilamentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建耗材（输入须已通过 NewFilament::normalized 校验）
    pub fn insert(&self, new: &NewFilament) -> RepositoryResult<Filament> {
        let conn = self.get_conn()?;
        let now = Local::now().naive_local();

        conn.execute(
            r#"
            INSERT INTO filament (
                external_id, sku, material, color, diameter,
                grams_available, grams_reserved, reorder_point_grams,
                grams_per_unit, est_print_min_per_unit, notes,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            "#,
            params![
                new.external_id,
                new.sku,
                new.material,
                new.color,
                new.diameter.unwrap_or(DEFAULT_DIAMETER_MM),
                new.grams_available,
                new.grams_reserved,
                new.reorder_point_grams,
                new.grams_per_unit,
                new.est_print_min_per_unit,
                new.notes,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        load_filament_by_id(&conn, id)?
            .ok_or_else(|| RepositoryError::InternalError(format!("新建耗材后读取失败: id={}", id)))
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Filament>> {
        let conn = self.get_conn()?;
        load_filament_by_id(&conn, id)
    }

    pub fn find_by_sku(&self, sku: &str) -> RepositoryResult<Option<Filament>> {
        let conn = self.get_conn()?;
        load_filament_by_sku(&conn, sku)
    }

    pub fn find_by_external_id(&self, external_id: &str) -> RepositoryResult<Option<Filament>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM filament WHERE external_id = ?1", FILAMENT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![external_id], map_filament_row)
            .optional()?)
    }

    /// 两步解析: 先按友好ID，再按数值主键
    pub fn resolve(&self, identifier: &str) -> RepositoryResult<Filament> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(RepositoryError::not_found("Filament", identifier));
        }

        if let Some(found) = self.find_by_external_id(identifier)? {
            return Ok(found);
        }

        if let Ok(id) = identifier.parse::<i64>() {
            if let Some(found) = self.find_by_id(id)? {
                return Ok(found);
            }
        }

        Err(RepositoryError::not_found("Filament", identifier))
    }

    /// 全部耗材（按 材料/颜色/SKU 排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Filament>> {
        let conn = self.get_conn()?;
        load_all_filaments(&conn)
    }

    /// 按增量调整可用库存
    ///
    /// # 红线
    /// - 调整后可用量不得低于已预留量
    /// - 只修改 grams_available（及 updated_at）
    pub fn adjust_available(&self, id: i64, delta: i64) -> RepositoryResult<Filament> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let filament = load_filament_by_id(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("Filament", id))?;
        let new_available = filament.adjusted_available(delta)?;

        tx.execute(
            "UPDATE filament SET grams_available = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_available, Local::now().naive_local(), id],
        )?;

        let updated = load_filament_by_id(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("Filament", id))?;
        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok(updated)
    }

    pub fn set_reorder_point(&self, id: i64, grams: i64) -> RepositoryResult<Filament> {
        if grams < 0 {
            return Err(RepositoryError::FieldValueError {
                field: "reorderPointGrams".to_string(),
                message: format!("不能为负数: {}", grams),
            });
        }

        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE filament SET reorder_point_grams = ?1, updated_at = ?2 WHERE id = ?3",
            params![grams, Local::now().naive_local(), id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Filament", id));
        }

        load_filament_by_id(&conn, id)?.ok_or_else(|| RepositoryError::not_found("Filament", id))
    }

    /// 删除耗材（仍有预留时拒绝）
    pub fn delete(&self, id: i64) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let holds: i64 = tx.query_row(
            "SELECT COUNT(*) FROM filament_reservation WHERE filament_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if holds > 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "耗材仍有{}条预留，不能删除: id={}",
                holds, id
            )));
        }

        let affected = tx.execute("DELETE FROM filament WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Filament", id));
        }
        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok(())
    }
}
