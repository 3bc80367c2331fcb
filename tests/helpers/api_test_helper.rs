// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 基于临时数据库装配完整 AppState，提供管理员/普通用户两类操作人
// ==========================================

use print_stock::api::{
    CreateFilamentRequest, CreateMachineRequest, EnqueueJobRequest, FilamentView, MachineView,
    Operator, ReserveItem, ReserveRequest,
};
use print_stock::app::AppState;
use tempfile::NamedTempFile;

// ==========================================
// API测试环境
// ==========================================
pub struct ApiTestEnv {
    pub state: AppState,
    pub admin: Operator,
    pub customer: Operator,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 创建新的API测试环境（每个测试独立数据库）
    pub fn new() -> Self {
        print_stock::logging::init_test();

        let temp_file = NamedTempFile::new().expect("创建临时数据库文件失败");
        let db_path = temp_file
            .path()
            .to_str()
            .expect("临时文件路径不是合法 UTF-8")
            .to_string();
        let state = AppState::new(db_path).expect("初始化 AppState 失败");

        Self {
            state,
            admin: Operator::admin("admin"),
            customer: Operator::new("cliente", "customer"),
            _temp_file: temp_file,
        }
    }

    pub fn db_path(&self) -> &str {
        &self.state.db_path
    }

    // ==========================================
    // 数据准备
    // ==========================================

    /// 新建耗材（预留初值为 0）
    pub fn create_filament(
        &self,
        sku: &str,
        material: &str,
        available: i64,
        grams_per_unit: i64,
        est_minutes: i64,
    ) -> FilamentView {
        self.state
            .filament_api
            .create(
                &self.admin,
                CreateFilamentRequest {
                    sku: sku.to_string(),
                    material: material.to_string(),
                    color: "Rojo".to_string(),
                    grams_available: Some(available),
                    grams_per_unit: Some(grams_per_unit),
                    est_print_min_per_unit: Some(est_minutes),
                    ..Default::default()
                },
            )
            .expect("新建耗材失败")
    }

    /// 新建机台
    pub fn create_machine(&self, identifier: &str, status: &str, materials: &[&str]) -> MachineView {
        self.state
            .machine_api
            .create(
                &self.admin,
                CreateMachineRequest {
                    identifier: identifier.to_string(),
                    status: Some(status.to_string()),
                    compatible_materials: Some(materials.iter().map(|m| m.to_string()).collect()),
                    ..Default::default()
                },
            )
            .expect("新建机台失败")
    }

    /// 入队一个任务
    pub fn enqueue(&self, machine: &str, sku: &str, qty: i64, remaining_minutes: i64) -> MachineView {
        self.state
            .machine_api
            .enqueue_job(
                &self.admin,
                machine,
                EnqueueJobRequest {
                    sku: sku.to_string(),
                    title: format!("{} x{}", sku, qty),
                    qty,
                    est_minutes_per_unit: None,
                    remaining_minutes: Some(remaining_minutes),
                },
            )
            .expect("任务入队失败")
    }

    /// 构造预留请求
    pub fn reserve_request(order_id: &str, items: &[(&str, i64)]) -> ReserveRequest {
        ReserveRequest {
            order_id: order_id.to_string(),
            items: items
                .iter()
                .map(|(sku, qty)| ReserveItem {
                    sku: sku.to_string(),
                    qty: *qty,
                    grams_per_unit: None,
                })
                .collect(),
        }
    }

    /// 按 SKU 读取耗材当前状态
    pub fn filament(&self, sku: &str) -> FilamentView {
        self.state
            .filament_api
            .get(&self.admin, sku)
            .expect("读取耗材失败")
    }
}
