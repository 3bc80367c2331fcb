// ==========================================
// 3D打印库存与排产系统 - 耗材预留仓储
// ==========================================
// 职责: filament_reservation 表读写 + filament.grams_reserved/grams_available 联动
// 红线: 一个订单的预留/消耗/释放均为单个 IMMEDIATE 事务，任一行失败整体回滚
// ==========================================

use chrono::Local;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex};

use crate::domain::error::DomainError;
use crate::domain::reservation::{FilamentReservation, ReservationLine, Settlement};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::filament_repo::load_filament_by_sku;

const RESERVATION_SELECT: &str = r#"
    SELECT r.id, r.order_id, r.filament_id, f.sku, f.external_id,
           r.grams, r.metadata, r.created_at, r.updated_at
    FROM filament_reservation r
    JOIN filament f ON f.id = r.filament_id
"#;

fn map_reservation_row(row: &Row<'_>) -> rusqlite::Result<FilamentReservation> {
    let filament_id: i64 = row.get(2)?;
    let external_id: Option<String> = row.get(4)?;
    let metadata_raw: String = row.get(6)?;
    let metadata: JsonValue = serde_json::from_str(&metadata_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    let filament_public_id = match external_id {
        Some(ext) if !ext.trim().is_empty() => ext,
        _ => filament_id.to_string(),
    };

    Ok(FilamentReservation {
        id: row.get(0)?,
        order_id: row.get(1)?,
        filament_id,
        filament_sku: row.get(3)?,
        filament_public_id,
        grams: row.get(5)?,
        metadata,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn load_by_order(conn: &Connection, order_id: &str) -> RepositoryResult<Vec<FilamentReservation>> {
    let sql = format!("{} WHERE r.order_id = ?1 ORDER BY r.id ASC", RESERVATION_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![order_id], map_reservation_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// 预留批次结果
#[derive(Debug, Clone)]
pub struct ReserveBatch {
    pub reservations: Vec<FilamentReservation>,
    /// true: 订单已有预留，直接返回既有记录（重试请求）
    pub replayed: bool,
}

// ==========================================
// ReservationRepository - 预留仓储
// ==========================================
pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 为订单预留耗材
    ///
    /// # 流程
    /// 1. 订单已有预留 → 原样返回（幂等短路）
    /// 2. 逐行: 按 SKU 定位耗材 → 计算所需克数 → 条件更新 grams_reserved → 写预留行
    /// 3. 全部成功才提交
    ///
    /// # 说明
    /// 条件更新 `grams_available - grams_reserved >= needed` 在存储层原子完成，
    /// 影响行数为 0 即视为库存不足
    pub fn reserve_batch(
        &self,
        order_id: &str,
        lines: &[ReservationLine],
    ) -> RepositoryResult<ReserveBatch> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = load_by_order(&tx, order_id)?;
        if !existing.is_empty() {
            return Ok(ReserveBatch {
                reservations: existing,
                replayed: true,
            });
        }

        let now = Local::now().naive_local();
        for line in lines {
            let filament = load_filament_by_sku(&tx, &line.sku)?
                .ok_or_else(|| RepositoryError::not_found("Filament", &line.sku))?;

            let (needed, grams_per_unit) = filament.grams_needed(line.quantity, line.grams_per_unit)?;
            filament.check_can_reserve(needed)?;

            let affected = tx.execute(
                r#"
                UPDATE filament
                SET grams_reserved = grams_reserved + ?1, updated_at = ?2
                WHERE id = ?3 AND grams_available - grams_reserved >= ?1
                "#,
                params![needed, now, filament.id],
            )?;
            if affected == 0 {
                return Err(DomainError::InsufficientStock {
                    sku: filament.sku.clone(),
                    needed,
                    free: filament.free_grams(),
                }
                .into());
            }

            let metadata = json!({
                "sku": filament.sku,
                "qty": line.quantity,
                "gramsPerUnit": grams_per_unit,
            });
            tx.execute(
                r#"
                INSERT INTO filament_reservation (
                    order_id, filament_id, grams, metadata, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                "#,
                params![order_id, filament.id, needed, metadata.to_string(), now],
            )?;
        }

        let created = load_by_order(&tx, order_id)?;
        tx.commit().map_err(RepositoryError::transaction_failed)?;

        Ok(ReserveBatch {
            reservations: created,
            replayed: false,
        })
    }

    /// 结算订单的全部预留（消耗或释放），返回被结算的记录
    ///
    /// 订单无预留时返回空列表
    pub fn settle(
        &self,
        order_id: &str,
        settlement: Settlement,
    ) -> RepositoryResult<Vec<FilamentReservation>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let reservations = load_by_order(&tx, order_id)?;
        if reservations.is_empty() {
            return Ok(reservations);
        }

        let now = Local::now().naive_local();
        let sql = match settlement {
            Settlement::Consume => {
                r#"
                UPDATE filament
                SET grams_reserved = MAX(grams_reserved - ?1, 0),
                    grams_available = MAX(grams_available - ?1, 0),
                    updated_at = ?2
                WHERE id = ?3
                "#
            }
            Settlement::Release => {
                r#"
                UPDATE filament
                SET grams_reserved = MAX(grams_reserved - ?1, 0),
                    updated_at = ?2
                WHERE id = ?3
                "#
            }
        };

        {
            let mut stmt = tx.prepare(sql)?;
            for reservation in &reservations {
                stmt.execute(params![reservation.grams, now, reservation.filament_id])?;
            }
        }

        tx.execute(
            "DELETE FROM filament_reservation WHERE order_id = ?1",
            params![order_id],
        )?;
        tx.commit().map_err(RepositoryError::transaction_failed)?;

        Ok(reservations)
    }

    pub fn list_by_order(&self, order_id: &str) -> RepositoryResult<Vec<FilamentReservation>> {
        let conn = self.get_conn()?;
        load_by_order(&conn, order_id)
    }
}
