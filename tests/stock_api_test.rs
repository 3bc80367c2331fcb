// ==========================================
// 库存总览 / ATP / 操作日志 测试
// ==========================================

mod helpers;

use helpers::api_test_helper::ApiTestEnv;
use print_stock::api::{CreateMachineRequest, ErrorKind};
use print_stock::app::AppState;
use print_stock::config::config_keys;
use print_stock::domain::{AlertKind, AlertLevel};

// ==========================================
// ATP
// ==========================================

#[test]
fn test_atp_single_idle_printer() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);
    env.create_machine("P1", "online", &["PLA"]);

    let atp = env.state.stock_api.atp(&env.admin, "PLA-RED").expect("ATP 失败");
    assert_eq!(atp.sku, "PLA-RED");
    assert_eq!(atp.material, "PLA");
    assert_eq!(atp.free_grams, 1000);
    assert_eq!(atp.grams_per_unit, 80);
    assert_eq!(atp.units_by_materials, 12);
    assert_eq!(atp.units_available_24h, 48);
    assert_eq!(atp.units_available_72h, 144);
}

#[test]
fn test_atp_reflects_reservations_and_queue() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);
    env.create_machine("P1", "online", &["PLA"]);
    env.create_machine("P2", "maintenance", &["PLA"]);
    env.create_machine("P3", "online", &["PETG"]);
    env.enqueue("P1", "PLA-RED", 4, 240);

    env.state
        .reservation_api
        .reserve(&env.admin, ApiTestEnv::reserve_request("C1", &[("PLA-RED", 3)]))
        .expect("预留应成功");

    let atp = env.state.stock_api.atp(&env.admin, "PLA-RED").expect("ATP 失败");
    assert_eq!(atp.free_grams, 760);
    assert_eq!(atp.units_by_materials, 9);
    // 只计在线且兼容的 P1: (1440 - 240) / 30
    assert_eq!(atp.units_available_24h, 40);
    assert_eq!(atp.units_available_72h, 136);
}

#[test]
fn test_atp_speed_factor_scales_capacity() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);
    env.state
        .machine_api
        .create(
            &env.admin,
            CreateMachineRequest {
                identifier: "P1".to_string(),
                avg_speed_factor: Some(1.5),
                compatible_materials: Some(vec!["pla".to_string()]),
                ..Default::default()
            },
        )
        .expect("新建机台失败");

    let atp = env.state.stock_api.atp(&env.admin, "PLA-RED").expect("ATP 失败");
    assert_eq!(atp.units_available_24h, 72);
}

#[test]
fn test_atp_errors() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);

    let err = env.state.stock_api.atp(&env.admin, "   ").expect_err("空 SKU 应失败");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = env
        .state
        .stock_api
        .atp(&env.admin, "ABS-XXX")
        .expect_err("未知 SKU 应失败");
    assert_eq!(err.kind(), ErrorKind::Validation);

    // 无机台时产能为 0，但仍返回估算
    let atp = env.state.stock_api.atp(&env.admin, "PLA-RED").expect("ATP 失败");
    assert_eq!(atp.units_available_24h, 0);
    assert_eq!(atp.units_by_materials, 12);
}

// ==========================================
// 库存总览与告警
// ==========================================

#[test]
fn test_snapshot_alerts() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);
    env.create_filament("TPU-WHT", "TPU", 100, 50, 60);
    env.create_filament("PETG-CLR", "PETG", 2000, 60, 45);
    env.state
        .filament_api
        .set_reorder_point(&env.admin, "PLA-RED", 300)
        .expect("设置补货点失败");
    env.state
        .reservation_api
        .reserve(
            &env.admin,
            ApiTestEnv::reserve_request("D1", &[("PLA-RED", 9), ("TPU-WHT", 2)]),
        )
        .expect("预留应成功");

    env.create_machine("P1", "online", &["PLA"]);
    env.create_machine("P3", "maintenance", &["PLA"]);
    env.state
        .machine_api
        .create(
            &env.admin,
            CreateMachineRequest {
                identifier: "P2".to_string(),
                maintenance_every_hours: Some(120),
                maintenance_hours_used: Some(110),
                ..Default::default()
            },
        )
        .expect("新建机台失败");

    let snapshot = env.state.stock_api.snapshot(&env.admin).expect("快照失败");
    assert_eq!(snapshot.filaments.len(), 3);
    assert_eq!(snapshot.machines.len(), 3);

    let find = |kind: AlertKind, target: &str| {
        snapshot
            .alerts
            .iter()
            .find(|a| a.kind == kind && a.target_id == target)
            .map(|a| a.level)
    };
    let pla = snapshot
        .filaments
        .iter()
        .find(|f| f.sku == "PLA-RED")
        .expect("缺少 PLA-RED");
    let tpu = snapshot
        .filaments
        .iter()
        .find(|f| f.sku == "TPU-WHT")
        .expect("缺少 TPU-WHT");

    assert!(pla.needs_reorder);
    assert_eq!(find(AlertKind::Stock, pla.id.as_str()), Some(AlertLevel::Warning));
    assert_eq!(find(AlertKind::Stock, tpu.id.as_str()), Some(AlertLevel::Critical));
    assert_eq!(find(AlertKind::Maintenance, "P3"), Some(AlertLevel::Critical));
    assert_eq!(find(AlertKind::Maintenance, "P2"), Some(AlertLevel::Warning));
    assert_eq!(find(AlertKind::Maintenance, "P1"), None);
    assert_eq!(snapshot.alerts.len(), 4);
}

#[test]
fn test_alert_ratio_from_config() {
    let env = ApiTestEnv::new();
    env.state
        .machine_api
        .create(
            &env.admin,
            CreateMachineRequest {
                identifier: "P1".to_string(),
                maintenance_every_hours: Some(100),
                maintenance_hours_used: Some(60),
                ..Default::default()
            },
        )
        .expect("新建机台失败");

    let snapshot = env.state.stock_api.snapshot(&env.admin).expect("快照失败");
    assert!(snapshot.alerts.is_empty());

    env.state
        .config_manager
        .set_global_value(config_keys::MAINTENANCE_ALERT_RATIO, "0.5")
        .expect("写入配置失败");

    // 参数在装配时加载，新实例才生效
    let reloaded = AppState::new(env.db_path().to_string()).expect("重新装配失败");
    assert_eq!(reloaded.stock_api.config().maintenance_alert_ratio, 0.5);
    let snapshot = reloaded.stock_api.snapshot(&env.admin).expect("快照失败");
    assert_eq!(snapshot.alerts.len(), 1);
    assert_eq!(snapshot.alerts[0].level, AlertLevel::Warning);
}

// ==========================================
// 操作日志
// ==========================================

#[test]
fn test_actions_are_audited_newest_first() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);
    env.create_machine("P1", "online", &["PLA"]);
    env.state
        .reservation_api
        .reserve(&env.admin, ApiTestEnv::reserve_request("E1", &[("PLA-RED", 1)]))
        .expect("预留应成功");
    env.state
        .reservation_api
        .consume(&env.admin, "E1")
        .expect("消耗应成功");

    let actions = env
        .state
        .stock_api
        .list_recent_actions(&env.admin, 10)
        .expect("读取日志失败");
    let types: Vec<&str> = actions.iter().map(|a| a.action_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["CONSUME_RESERVATION", "RESERVE", "CREATE_MACHINE", "CREATE_FILAMENT"]
    );
    assert!(actions.iter().all(|a| a.actor == "admin"));
    assert_eq!(actions[0].target.as_deref(), Some("E1"));

    let limited = env
        .state
        .stock_api
        .list_recent_actions(&env.admin, 2)
        .expect("读取日志失败");
    assert_eq!(limited.len(), 2);
}

#[test]
fn test_failed_operations_not_audited() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 100, 80, 30);

    let _ = env
        .state
        .reservation_api
        .reserve(&env.admin, ApiTestEnv::reserve_request("E2", &[("PLA-RED", 5)]));
    let _ = env.state.filament_api.adjust(&env.admin, "PLA-RED", -1000);

    let actions = env
        .state
        .stock_api
        .list_recent_actions(&env.admin, 50)
        .expect("读取日志失败");
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, "CREATE_FILAMENT");
}
