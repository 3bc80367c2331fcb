// ==========================================
// 3D打印库存与排产系统 - 机台与任务队列仓储
// ==========================================
// 职责: machine / machine_job 表的读写
// 约束: 队列重排在 IMMEDIATE 事务内 "读全队列 → 内存重排 → 回写全部 position"
// ==========================================

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::domain::job_queue::{JobQueue, MachineJob};
use crate::domain::machine::{Machine, NewJob, NewMachine, DEFAULT_MAINTENANCE_EVERY_HOURS};
use crate::domain::types::MachineStatus;
use crate::domain::DomainResult;
use crate::repository::error::{RepositoryError, RepositoryResult};

const MACHINE_COLUMNS: &str = r#"
    id, identifier, name, model, status, nozzle, avg_speed_factor,
    maintenance_every_hours, maintenance_hours_used, last_maintenance_at,
    compatible_materials, created_at, updated_at
"#;

const JOB_COLUMNS: &str = r#"
    id, machine_id, sku, title, quantity, est_minutes_per_unit,
    remaining_minutes, position, created_at, updated_at
"#;

fn map_machine_row(row: &Row<'_>) -> rusqlite::Result<Machine> {
    let status_raw: String = row.get(4)?;
    let materials_raw: String = row.get(10)?;

    let status = MachineStatus::parse_lenient(&status_raw).unwrap_or_else(|| {
        warn!(status = %status_raw, "机台状态无法识别，按 online 处理");
        MachineStatus::Online
    });
    let compatible_materials: Vec<String> =
        serde_json::from_str(&materials_raw).unwrap_or_else(|e| {
            warn!(error = %e, "兼容材料列表解析失败，按空列表处理");
            Vec::new()
        });

    Ok(Machine {
        id: row.get(0)?,
        identifier: row.get(1)?,
        name: row.get(2)?,
        model: row.get(3)?,
        status,
        nozzle: row.get(5)?,
        avg_speed_factor: row.get(6)?,
        maintenance_every_hours: row.get(7)?,
        maintenance_hours_used: row.get(8)?,
        last_maintenance_at: row.get(9)?,
        compatible_materials,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        queue: JobQueue::default(),
    })
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<MachineJob> {
    Ok(MachineJob {
        id: row.get(0)?,
        machine_id: row.get(1)?,
        sku: row.get(2)?,
        title: row.get(3)?,
        quantity: row.get(4)?,
        est_minutes_per_unit: row.get(5)?,
        remaining_minutes: row.get(6)?,
        position: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn load_queue(conn: &Connection, machine_id: i64) -> RepositoryResult<JobQueue> {
    let sql = format!(
        "SELECT {} FROM machine_job WHERE machine_id = ?1 ORDER BY position ASC, id ASC",
        JOB_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let jobs = stmt
        .query_map(params![machine_id], map_job_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(JobQueue::from_jobs(jobs))
}

fn load_machine_where(
    conn: &Connection,
    predicate: &str,
    value: &dyn rusqlite::ToSql,
) -> RepositoryResult<Option<Machine>> {
    let sql = format!("SELECT {} FROM machine WHERE {}", MACHINE_COLUMNS, predicate);
    let machine = conn.query_row(&sql, [value], map_machine_row).optional()?;

    match machine {
        Some(mut machine) => {
            machine.queue = load_queue(conn, machine.id)?;
            Ok(Some(machine))
        }
        None => Ok(None),
    }
}

/// 将队列中的 position 回写（仅更新变化的行）
fn write_positions(conn: &Connection, machine_id: i64, queue: &JobQueue) -> RepositoryResult<usize> {
    let now = Local::now().naive_local();
    let mut stmt = conn.prepare(
        "UPDATE machine_job SET position = ?1, updated_at = ?2 \
         WHERE id = ?3 AND machine_id = ?4 AND position != ?1",
    )?;

    let mut written = 0;
    for (job_id, position) in queue.positions() {
        written += stmt.execute(params![position, now, job_id, machine_id])?;
    }
    Ok(written)
}

/// 回写机台自身字段（可在事务内调用）
fn write_machine(conn: &Connection, machine: &Machine) -> RepositoryResult<()> {
    let materials = serde_json::to_string(&machine.compatible_materials)
        .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

    let affected = conn.execute(
        r#"
        UPDATE machine SET
            name = ?1, model = ?2, status = ?3, nozzle = ?4,
            avg_speed_factor = ?5, maintenance_every_hours = ?6,
            maintenance_hours_used = ?7, last_maintenance_at = ?8,
            compatible_materials = ?9, updated_at = ?10
        WHERE id = ?11
        "#,
        params![
            machine.name,
            machine.model,
            machine.status.as_str(),
            machine.nozzle,
            machine.avg_speed_factor,
            machine.maintenance_every_hours,
            machine.maintenance_hours_used,
            machine.last_maintenance_at,
            materials,
            Local::now().naive_local(),
            machine.id,
        ],
    )?;
    if affected == 0 {
        return Err(RepositoryError::not_found("Machine", &machine.identifier));
    }
    Ok(())
}

/// 全部机台（含队列，按 identifier 排序；可在事务内调用）
pub(crate) fn load_all_machines(conn: &Connection) -> RepositoryResult<Vec<Machine>> {
    let sql = format!("SELECT {} FROM machine ORDER BY identifier ASC", MACHINE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut machines = stmt
        .query_map([], map_machine_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for machine in machines.iter_mut() {
        machine.queue = load_queue(conn, machine.id)?;
    }
    Ok(machines)
}

// ==========================================
// MachineRepository - 机台仓储
// ==========================================
pub struct MachineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 机台
    // ==========================================

    /// 新建机台（输入须已通过 NewMachine::normalized 校验）
    pub fn insert(&self, new: &NewMachine) -> RepositoryResult<Machine> {
        let conn = self.get_conn()?;
        let now = Local::now().naive_local();
        let materials = serde_json::to_string(&new.compatible_materials)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO machine (
                identifier, name, model, status, nozzle, avg_speed_factor,
                maintenance_every_hours, maintenance_hours_used,
                compatible_materials, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
            params![
                new.identifier,
                new.name,
                new.model,
                new.status.as_str(),
                new.nozzle,
                new.avg_speed_factor.unwrap_or(1.0),
                new.maintenance_every_hours
                    .unwrap_or(DEFAULT_MAINTENANCE_EVERY_HOURS),
                new.maintenance_hours_used.unwrap_or(0),
                materials,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        load_machine_where(&conn, "id = ?1", &id)?
            .ok_or_else(|| RepositoryError::InternalError(format!("新建机台后读取失败: id={}", id)))
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        load_machine_where(&conn, "id = ?1", &id)
    }

    pub fn find_by_identifier(&self, identifier: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        load_machine_where(&conn, "identifier = ?1", &identifier)
    }

    /// 两步解析: 先按 identifier，再按数值主键
    pub fn resolve(&self, identifier: &str) -> RepositoryResult<Machine> {
        let identifier = identifier.trim();
        if let Some(found) = self.find_by_identifier(identifier)? {
            return Ok(found);
        }
        if let Ok(id) = identifier.parse::<i64>() {
            if let Some(found) = self.find_by_id(id)? {
                return Ok(found);
            }
        }
        Err(RepositoryError::not_found("Machine", identifier))
    }

    /// 全部机台（含队列，按 identifier 排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Machine>> {
        let conn = self.get_conn()?;
        load_all_machines(&conn)
    }

    /// 在事务内读取机台，执行内存变更后回写机台自身字段（不含队列）
    ///
    /// 闭包返回错误时事务回滚，机台保持不变
    pub fn mutate_machine<T, F>(&self, id: i64, mutate: F) -> RepositoryResult<(Machine, T)>
    where
        F: FnOnce(&mut Machine) -> DomainResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut machine = load_machine_where(&tx, "id = ?1", &id)?
            .ok_or_else(|| RepositoryError::not_found("Machine", id))?;
        let outcome = mutate(&mut machine)?;
        write_machine(&tx, &machine)?;

        let updated = load_machine_where(&tx, "id = ?1", &id)?
            .ok_or_else(|| RepositoryError::not_found("Machine", &machine.identifier))?;
        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok((updated, outcome))
    }

    /// 删除机台（队列任务级联删除）
    pub fn delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM machine WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Machine", id));
        }
        Ok(())
    }

    // ==========================================
    // 队列
    // ==========================================

    /// 追加任务到队尾
    pub fn insert_job(&self, machine_id: i64, job: &NewJob) -> RepositoryResult<MachineJob> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Local::now().naive_local();

        let queue = load_queue(&tx, machine_id)?;
        tx.execute(
            r#"
            INSERT INTO machine_job (
                machine_id, sku, title, quantity, est_minutes_per_unit,
                remaining_minutes, position, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
            params![
                machine_id,
                job.sku,
                job.title,
                job.quantity,
                job.est_minutes_per_unit,
                job.remaining_minutes,
                queue.len() as i64,
                now,
            ],
        )?;
        let job_id = tx.last_insert_rowid();

        // 既有队列若存在空洞，顺带归一
        let queue = load_queue(&tx, machine_id)?;
        write_positions(&tx, machine_id, &queue)?;
        let created = queue
            .get(job_id)
            .cloned()
            .ok_or_else(|| RepositoryError::InternalError(format!("新建任务后读取失败: id={}", job_id)))?;

        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok(created)
    }

    /// 在事务内读取机台及其队列，执行内存变更后回写全部 position
    ///
    /// 闭包返回错误时事务回滚，队列保持不变
    pub fn mutate_queue<T, F>(&self, machine_id: i64, mutate: F) -> RepositoryResult<(Machine, T)>
    where
        F: FnOnce(&mut Machine) -> DomainResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut machine = load_machine_where(&tx, "id = ?1", &machine_id)?
            .ok_or_else(|| RepositoryError::not_found("Machine", machine_id))?;
        let outcome = mutate(&mut machine)?;
        write_positions(&tx, machine_id, &machine.queue)?;

        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok((machine, outcome))
    }

    /// 删除任务（完成/取消）并重排剩余队列
    pub fn delete_job(&self, machine_id: i64, job_id: i64) -> RepositoryResult<(Machine, MachineJob)> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut machine = load_machine_where(&tx, "id = ?1", &machine_id)?
            .ok_or_else(|| RepositoryError::not_found("Machine", machine_id))?;
        let removed = machine.queue.remove(job_id).ok_or_else(|| RepositoryError::NotFound {
            entity: format!("MachineJob@{}", machine.identifier),
            id: job_id.to_string(),
        })?;

        tx.execute(
            "DELETE FROM machine_job WHERE id = ?1 AND machine_id = ?2",
            params![job_id, machine_id],
        )?;
        write_positions(&tx, machine_id, &machine.queue)?;

        tx.commit().map_err(RepositoryError::transaction_failed)?;
        Ok((machine, removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, open_sqlite_connection};
    use crate::domain::types::MoveDirection;

    fn setup_test_repo() -> MachineRepository {
        let conn = open_sqlite_connection(":memory:").expect("Failed to open db");
        init_schema(&conn).expect("Failed to init schema");
        MachineRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn new_machine(identifier: &str) -> NewMachine {
        NewMachine {
            identifier: identifier.to_string(),
            compatible_materials: vec!["PLA".to_string()],
            ..Default::default()
        }
        .normalized()
        .expect("valid machine")
    }

    fn new_job(minutes: i64) -> NewJob {
        NewJob {
            sku: "PLA-RED".to_string(),
            title: "Llavero".to_string(),
            quantity: 1,
            est_minutes_per_unit: minutes,
            remaining_minutes: 0,
        }
    }

    #[test]
    fn test_insert_and_resolve() {
        let repo = setup_test_repo();
        let created = repo.insert(&new_machine("P1")).unwrap();

        assert_eq!(created.name, "P1");
        assert_eq!(created.status, MachineStatus::Online);
        assert_eq!(created.compatible_materials, vec!["PLA".to_string()]);
        assert!(created.queue.is_empty());

        assert_eq!(repo.resolve("P1").unwrap().id, created.id);
        assert_eq!(repo.resolve(&created.id.to_string()).unwrap().id, created.id);
        assert!(matches!(repo.resolve("P9"), Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let repo = setup_test_repo();
        repo.insert(&new_machine("P1")).unwrap();
        assert!(matches!(
            repo.insert(&new_machine("P1")),
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));
    }

    #[test]
    fn test_insert_job_appends() {
        let repo = setup_test_repo();
        let machine = repo.insert(&new_machine("P1")).unwrap();

        let first = repo.insert_job(machine.id, &new_job(10)).unwrap();
        let second = repo.insert_job(machine.id, &new_job(20)).unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);

        let loaded = repo.resolve("P1").unwrap();
        assert_eq!(loaded.queue.job_ids(), vec![first.id, second.id]);
        assert_eq!(loaded.queue_eta_minutes(), 30);
    }

    #[test]
    fn test_mutate_queue_persists_positions() {
        let repo = setup_test_repo();
        let machine = repo.insert(&new_machine("P1")).unwrap();
        let ids: Vec<i64> = (0..3)
            .map(|_| repo.insert_job(machine.id, &new_job(10)).unwrap().id)
            .collect();

        let (_, moved) = repo
            .mutate_queue(machine.id, |m| m.move_job(ids[2], MoveDirection::Up))
            .unwrap();
        assert!(moved);

        let loaded = repo.resolve("P1").unwrap();
        assert_eq!(loaded.queue.job_ids(), vec![ids[0], ids[2], ids[1]]);
        let positions: Vec<i64> = loaded.queue.jobs().iter().map(|j| j.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_mutate_queue_error_rolls_back() {
        let repo = setup_test_repo();
        let machine = repo.insert(&new_machine("P1")).unwrap();
        repo.insert_job(machine.id, &new_job(10)).unwrap();

        let result = repo.mutate_queue(machine.id, |m| m.set_job_position(999, 1));
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_mutate_machine_persists_fields() {
        let repo = setup_test_repo();
        let machine = repo.insert(&new_machine("P1")).unwrap();

        let (updated, before) = repo
            .mutate_machine(machine.id, |m| {
                let before = m.maintenance_hours_used;
                m.record_usage(12)?;
                m.status = MachineStatus::Maintenance;
                Ok(before)
            })
            .unwrap();
        assert_eq!(before, 0);
        assert_eq!(updated.maintenance_hours_used, 12);

        let loaded = repo.resolve("P1").unwrap();
        assert_eq!(loaded.maintenance_hours_used, 12);
        assert_eq!(loaded.status, MachineStatus::Maintenance);
    }

    #[test]
    fn test_mutate_machine_error_rolls_back() {
        let repo = setup_test_repo();
        let machine = repo.insert(&new_machine("P1")).unwrap();

        let result = repo.mutate_machine(machine.id, |m| {
            m.status = MachineStatus::Offline;
            m.record_usage(-1)
        });
        assert!(matches!(result, Err(RepositoryError::FieldValueError { .. })));

        let loaded = repo.resolve("P1").unwrap();
        assert_eq!(loaded.status, MachineStatus::Online);
        assert_eq!(loaded.maintenance_hours_used, 0);
        assert!(matches!(
            repo.mutate_machine(999, |_| Ok(())),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_job_resequences() {
        let repo = setup_test_repo();
        let machine = repo.insert(&new_machine("P1")).unwrap();
        let ids: Vec<i64> = (0..3)
            .map(|_| repo.insert_job(machine.id, &new_job(10)).unwrap().id)
            .collect();

        let (after, removed) = repo.delete_job(machine.id, ids[0]).unwrap();
        assert_eq!(removed.id, ids[0]);
        assert_eq!(after.queue.job_ids(), vec![ids[1], ids[2]]);

        let loaded = repo.resolve("P1").unwrap();
        let positions: Vec<i64> = loaded.queue.jobs().iter().map(|j| j.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_delete_machine_cascades_jobs() {
        let repo = setup_test_repo();
        let machine = repo.insert(&new_machine("P1")).unwrap();
        repo.insert_job(machine.id, &new_job(10)).unwrap();

        repo.delete(machine.id).unwrap();
        assert!(repo.find_by_identifier("P1").unwrap().is_none());

        let conn = repo.get_conn().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM machine_job", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
