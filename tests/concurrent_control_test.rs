// ==========================================
// 并发控制测试
// ==========================================
// 职责: 多连接并发预留时库存不被超卖；并发更新机台时不丢失写入；快照读取一致
// ==========================================

mod helpers;

use helpers::api_test_helper::ApiTestEnv;
use print_stock::api::{
    CreateFilamentRequest, CreateMachineRequest, ErrorKind, Operator, UpdateMachineRequest,
};
use print_stock::app::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_reserve_never_oversells() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);

    let workers = 20;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let db_path = env.db_path().to_string();
            let barrier = barrier.clone();
            thread::spawn(move || {
                // 每个线程独立连接，模拟多个进程
                let state = AppState::new(db_path).expect("初始化 AppState 失败");
                let admin = Operator::admin(format!("worker-{}", i));
                barrier.wait();
                state.reservation_api.reserve(
                    &admin,
                    ApiTestEnv::reserve_request(&format!("W{}", i), &[("PLA-RED", 1)]),
                )
            })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.join().expect("线程异常退出") {
            Ok(rows) => {
                assert_eq!(rows[0].grams, 80);
                ok += 1;
            }
            Err(e) => assert_eq!(e.kind(), ErrorKind::Validation, "意外错误: {}", e),
        }
    }

    // 1000 / 80 = 12
    assert_eq!(ok, 12);
    let f = env.filament("PLA-RED");
    assert_eq!(f.grams_reserved, 960);
    assert!(f.grams_reserved <= f.grams_available);
}

#[test]
fn test_concurrent_retries_reserve_once() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);

    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let db_path = env.db_path().to_string();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let state = AppState::new(db_path).expect("初始化 AppState 失败");
                barrier.wait();
                state.reservation_api.reserve(
                    &Operator::admin("retry"),
                    ApiTestEnv::reserve_request("SAME", &[("PLA-RED", 2)]),
                )
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let rows = handle
            .join()
            .expect("线程异常退出")
            .expect("同一订单重试应全部成功");
        ids.push(rows[0].id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(env.filament("PLA-RED").grams_reserved, 160);
}

#[test]
fn test_concurrent_usage_updates_not_lost() {
    let env = ApiTestEnv::new();
    env.create_machine("P1", "online", &["PLA"]);

    let workers = 16;
    let rounds = 10;
    // 额外一个线程并发改名，验证字段更新与工时累计互不覆盖
    let barrier = Arc::new(Barrier::new(workers + 1));
    let mut handles: Vec<_> = (0..workers)
        .map(|i| {
            let db_path = env.db_path().to_string();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let state = AppState::new(db_path).expect("初始化 AppState 失败");
                let admin = Operator::admin(format!("worker-{}", i));
                barrier.wait();
                for _ in 0..rounds {
                    state
                        .machine_api
                        .record_usage(&admin, "P1", 1)
                        .expect("累计工时失败");
                }
            })
        })
        .collect();

    let db_path = env.db_path().to_string();
    let rename_barrier = barrier.clone();
    handles.push(thread::spawn(move || {
        let state = AppState::new(db_path).expect("初始化 AppState 失败");
        rename_barrier.wait();
        state
            .machine_api
            .update(
                &Operator::admin("rename"),
                "P1",
                UpdateMachineRequest {
                    name: Some("Prusa MK4".to_string()),
                    ..Default::default()
                },
            )
            .expect("更新机台失败");
    }));

    for handle in handles {
        handle.join().expect("线程异常退出");
    }

    let machine = env.state.machine_api.get(&env.admin, "P1").expect("读取机台失败");
    assert_eq!(machine.maintenance_hours_used, (workers * rounds) as i64);
    assert_eq!(machine.name, "Prusa MK4");
}

#[test]
fn test_snapshot_sees_single_state_during_writes() {
    let env = ApiTestEnv::new();

    let readers = 3;
    let pairs = 30;
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(readers + 1));

    // 写线程总是先提交耗材再提交机台，任何一致的快照里机台数都不超过耗材数
    let writer = {
        let db_path = env.db_path().to_string();
        let barrier = barrier.clone();
        let done = done.clone();
        thread::spawn(move || {
            let state = AppState::new(db_path).expect("初始化 AppState 失败");
            let admin = Operator::admin("writer");
            barrier.wait();
            for i in 0..pairs {
                state
                    .filament_api
                    .create(
                        &admin,
                        CreateFilamentRequest {
                            sku: format!("PLA-{:02}", i),
                            material: "PLA".to_string(),
                            color: "Rojo".to_string(),
                            grams_available: Some(1000),
                            ..Default::default()
                        },
                    )
                    .expect("新建耗材失败");
                state
                    .machine_api
                    .create(
                        &admin,
                        CreateMachineRequest {
                            identifier: format!("P{:02}", i),
                            compatible_materials: Some(vec!["PLA".to_string()]),
                            ..Default::default()
                        },
                    )
                    .expect("新建机台失败");
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let handles: Vec<_> = (0..readers)
        .map(|i| {
            let db_path = env.db_path().to_string();
            let barrier = barrier.clone();
            let done = done.clone();
            thread::spawn(move || {
                let state = AppState::new(db_path).expect("初始化 AppState 失败");
                let admin = Operator::admin(format!("reader-{}", i));
                barrier.wait();
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    let snapshot = state.stock_api.snapshot(&admin).expect("快照失败");
                    assert!(
                        snapshot.machines.len() <= snapshot.filaments.len(),
                        "快照不一致: machines={} filaments={}",
                        snapshot.machines.len(),
                        snapshot.filaments.len()
                    );
                    if finished {
                        break;
                    }
                }
            })
        })
        .collect();

    writer.join().expect("写线程异常退出");
    for handle in handles {
        handle.join().expect("读线程异常退出");
    }

    let snapshot = env.state.stock_api.snapshot(&env.admin).expect("快照失败");
    assert_eq!(snapshot.filaments.len(), pairs);
    assert_eq!(snapshot.machines.len(), pairs);
}
