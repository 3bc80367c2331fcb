// ==========================================
// 管理员权限测试
// ==========================================
// 非管理员调用任何管理接口均返回 PermissionDenied，且不产生任何副作用
// ==========================================

mod helpers;

use helpers::api_test_helper::ApiTestEnv;
use print_stock::api::{ApiResult, CreateFilamentRequest, ErrorKind, Operator};

fn assert_denied<T: std::fmt::Debug>(result: ApiResult<T>) {
    let err = result.expect_err("非管理员调用应被拒绝");
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[test]
fn test_customer_is_denied_everywhere() {
    let env = ApiTestEnv::new();
    env.create_filament("PLA-RED", "PLA", 1000, 80, 30);
    env.create_machine("P1", "online", &["PLA"]);
    let view = env.enqueue("P1", "PLA-RED", 1, 30);
    let job_id = view.queue[0].id;
    let user = &env.customer;
    let s = &env.state;

    assert_denied(s.filament_api.create(
        user,
        CreateFilamentRequest {
            sku: "PLA-BLK".to_string(),
            material: "PLA".to_string(),
            color: "Negro".to_string(),
            ..Default::default()
        },
    ));
    assert_denied(s.filament_api.list(user));
    assert_denied(s.filament_api.get(user, "PLA-RED"));
    assert_denied(s.filament_api.adjust(user, "PLA-RED", 100));
    assert_denied(s.filament_api.set_reorder_point(user, "PLA-RED", 10));
    assert_denied(s.filament_api.delete(user, "PLA-RED"));

    assert_denied(s.machine_api.list(user));
    assert_denied(s.machine_api.record_usage(user, "P1", 5));
    assert_denied(s.machine_api.register_maintenance(user, "P1"));
    assert_denied(s.machine_api.move_job(user, "P1", job_id, "down"));
    assert_denied(s.machine_api.complete_job(user, "P1", job_id));
    assert_denied(s.machine_api.delete(user, "P1"));

    assert_denied(s.reservation_api.reserve(
        user,
        ApiTestEnv::reserve_request("X1", &[("PLA-RED", 1)]),
    ));
    assert_denied(s.reservation_api.consume(user, "X1"));
    assert_denied(s.reservation_api.release(user, "X1"));

    assert_denied(s.stock_api.snapshot(user));
    assert_denied(s.stock_api.atp(user, "PLA-RED"));
    assert_denied(s.stock_api.list_recent_actions(user, 10));

    // 状态未被改变
    let f = env.filament("PLA-RED");
    assert_eq!(f.grams_available, 1000);
    assert_eq!(f.grams_reserved, 0);
    let m = s.machine_api.get(&env.admin, "P1").expect("读取机台失败");
    assert_eq!(m.queue.len(), 1);
    assert_eq!(m.maintenance_hours_used, 0);
}

#[test]
fn test_role_match_is_exact() {
    let env = ApiTestEnv::new();

    let staff = Operator::new("staff", "Admin");
    assert_denied(env.state.stock_api.snapshot(&staff));

    let empty = Operator::new("anon", "");
    assert_denied(env.state.stock_api.snapshot(&empty));

    assert!(env.state.stock_api.snapshot(&env.admin).is_ok());
}
