// ==========================================
// 3D打印库存与排产系统 - 库存总览读取
// ==========================================
// 职责: 在同一个读事务内读取耗材与机台（含队列）
// 约束: 只读；快照与 ATP 的输入来自同一时刻的数据库状态
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::domain::filament::Filament;
use crate::domain::machine::Machine;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::filament_repo::{load_all_filaments, load_filaments_by_sku};
use crate::repository::machine_repo::load_all_machines;

/// 一次读事务得到的耗材与机台
#[derive(Debug, Clone)]
pub struct StockRows {
    pub filaments: Vec<Filament>,
    pub machines: Vec<Machine>,
}

// ==========================================
// StockRepository - 总览读取
// ==========================================
pub struct StockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 全部耗材 + 全部机台
    pub fn load_all(&self) -> RepositoryResult<StockRows> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let filaments = load_all_filaments(&tx)?;
        let machines = load_all_machines(&tx)?;

        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok(StockRows { filaments, machines })
    }

    /// 指定 SKU 的耗材批次 + 全部机台
    pub fn load_for_sku(&self, sku: &str) -> RepositoryResult<StockRows> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let filaments = load_filaments_by_sku(&tx, sku)?;
        let machines = load_all_machines(&tx)?;

        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok(StockRows { filaments, machines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, open_sqlite_connection};
    use crate::domain::filament::NewFilament;
    use crate::domain::machine::{NewJob, NewMachine};
    use crate::repository::filament_repo::FilamentRepository;
    use crate::repository::machine_repo::MachineRepository;

    fn setup() -> (StockRepository, FilamentRepository, MachineRepository) {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open db");
        init_schema(&conn).expect("Failed to init schema");
        let conn = Arc::new(Mutex::new(conn));
        (
            StockRepository::new(conn.clone()),
            FilamentRepository::new(conn.clone()),
            MachineRepository::new(conn),
        )
    }

    fn new_filament(sku: &str, material: &str) -> NewFilament {
        NewFilament {
            sku: sku.to_string(),
            material: material.to_string(),
            color: "Rojo".to_string(),
            grams_available: 1000,
            grams_per_unit: 80,
            ..Default::default()
        }
        .normalized()
        .expect("valid filament")
    }

    #[test]
    fn test_load_all_includes_queues() {
        let (stock, filaments, machines) = setup();
        filaments.insert(&new_filament("PLA-RED", "PLA")).unwrap();
        filaments.insert(&new_filament("PETG-BLK", "PETG")).unwrap();
        let p1 = machines
            .insert(
                &NewMachine {
                    identifier: "P1".to_string(),
                    compatible_materials: vec!["PLA".to_string()],
                    ..Default::default()
                }
                .normalized()
                .unwrap(),
            )
            .unwrap();
        machines
            .insert_job(
                p1.id,
                &NewJob {
                    sku: "PLA-RED".to_string(),
                    title: "Llavero".to_string(),
                    quantity: 2,
                    est_minutes_per_unit: 30,
                    remaining_minutes: 0,
                },
            )
            .unwrap();

        let rows = stock.load_all().unwrap();
        let skus: Vec<&str> = rows.filaments.iter().map(|f| f.sku.as_str()).collect();
        assert_eq!(skus, vec!["PETG-BLK", "PLA-RED"]);
        assert_eq!(rows.machines.len(), 1);
        assert_eq!(rows.machines[0].queue.len(), 1);

        let rows = stock.load_for_sku("PLA-RED").unwrap();
        assert_eq!(rows.filaments.len(), 1);
        assert_eq!(rows.machines.len(), 1);
        assert!(stock.load_for_sku("ABS-WHT").unwrap().filaments.is_empty());
    }
}
