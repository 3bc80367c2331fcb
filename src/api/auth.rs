// ==========================================
// 3D打印库存与排产系统 - 操作人与权限
// ==========================================
// 库存/排产操作仅限 role == "admin"
// 校验发生在任何查找或写入之前
// ==========================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::i18n::t_with_args;

pub const ADMIN_ROLE: &str = "admin";

/// 已认证的操作人（认证本身由外部完成）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub username: String,
    pub role: String,
}

impl Operator {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, ADMIN_ROLE)
    }

    /// 角色必须严格等于 "admin"
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// 非管理员直接拒绝
pub fn require_admin(operator: &Operator) -> ApiResult<()> {
    if operator.is_admin() {
        return Ok(());
    }

    warn!(
        user = %operator.username,
        role = %operator.role,
        "非管理员尝试执行库存操作，已拒绝"
    );
    Err(ApiError::PermissionDenied(t_with_args(
        "auth.admin_required",
        &[
            ("user", operator.username.as_str()),
            ("role", operator.role.as_str()),
        ],
    )))
}
