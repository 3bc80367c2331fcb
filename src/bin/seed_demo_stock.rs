// ==========================================
// 3D打印库存与排产系统 - 演示数据初始化
// ==========================================
// 用法: seed_demo_stock [db_path]
// 目标库存在时先备份为 <db>.bak.<时间戳> 再重建
// ==========================================

use chrono::Local;
use std::error::Error;
use std::fs;
use std::path::Path;

use print_stock::api::{
    CreateFilamentRequest, CreateMachineRequest, EnqueueJobRequest, Operator, ReserveItem,
    ReserveRequest,
};
use print_stock::app::{get_default_db_path, AppState};

fn main() -> Result<(), Box<dyn Error>> {
    print_stock::logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);

    backup_and_reset_db(&db_path)?;

    let state = AppState::new(db_path.clone())?;
    let operator = Operator::admin("seed");

    seed_filaments(&state, &operator)?;
    seed_machines(&state, &operator)?;

    state.reservation_api.reserve(
        &operator,
        ReserveRequest {
            order_id: "DEMO-1001".to_string(),
            items: vec![ReserveItem {
                sku: "PLA-RED".to_string(),
                qty: 3,
                grams_per_unit: None,
            }],
        },
    )?;

    let snapshot = state.stock_api.snapshot(&operator)?;
    println!(
        "Seeded {}: filaments={}, machines={}, alerts={}",
        db_path,
        snapshot.filaments.len(),
        snapshot.machines.len(),
        snapshot.alerts.len()
    );
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_filaments(state: &AppState, operator: &Operator) -> Result<(), Box<dyn Error>> {
    // (sku, 材料, 颜色, 可用g, 补货点g, 单件g, 单件min)
    let rows = [
        ("PLA-RED", "PLA", "Rojo", 1000, 200, 80, 30),
        ("PLA-BLK", "PLA", "Negro", 2500, 300, 60, 25),
        ("PETG-CLR", "PETG", "Transparente", 350, 400, 120, 45),
        ("TPU-WHT", "TPU", "Blanco", 0, 100, 40, 60),
    ];

    for (sku, material, color, grams, reorder, gpu, mpu) in rows {
        state.filament_api.create(
            operator,
            CreateFilamentRequest {
                sku: sku.to_string(),
                material: material.to_string(),
                color: color.to_string(),
                grams_available: Some(grams),
                reorder_point_grams: Some(reorder),
                grams_per_unit: Some(gpu),
                est_print_min_per_unit: Some(mpu),
                external_id: Some(sku.to_lowercase()),
                ..Default::default()
            },
        )?;
    }
    Ok(())
}

fn seed_machines(state: &AppState, operator: &Operator) -> Result<(), Box<dyn Error>> {
    let machines = [
        ("P1", "Prusa MK4", "online", 1.0, 40, vec!["PLA", "PETG"]),
        ("P2", "Bambu X1", "online", 1.5, 110, vec!["PLA", "PETG", "TPU"]),
        ("P3", "Ender 3", "maintenance", 0.8, 0, vec!["PLA"]),
    ];

    for (identifier, model, status, speed, hours_used, materials) in machines {
        state.machine_api.create(
            operator,
            CreateMachineRequest {
                identifier: identifier.to_string(),
                model: Some(model.to_string()),
                status: Some(status.to_string()),
                avg_speed_factor: Some(speed),
                maintenance_hours_used: Some(hours_used),
                compatible_materials: Some(materials.iter().map(|m| m.to_string()).collect()),
                ..Default::default()
            },
        )?;
    }

    let jobs = [
        ("P1", "PLA-RED", "Llavero logo", 10, 30),
        ("P1", "PETG-CLR", "Soporte celular", 2, 45),
        ("P2", "PLA-BLK", "Maceta", 4, 25),
    ];
    for (machine, sku, title, qty, minutes) in jobs {
        state.machine_api.enqueue_job(
            operator,
            machine,
            EnqueueJobRequest {
                sku: sku.to_string(),
                title: title.to_string(),
                qty,
                est_minutes_per_unit: Some(minutes),
                remaining_minutes: None,
            },
        )?;
    }
    Ok(())
}
