// ==========================================
// 3D打印库存与排产系统 - 领域类型定义
// ==========================================
// 机台状态 / 队列移动方向 / 告警类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 机台状态 (Machine Status)
// ==========================================
// 状态转换: online ⇄ maintenance, online ⇄ offline
// 全部由管理员触发，无自动定时器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    #[default]
    Online,      // 在线
    Maintenance, // 维护中
    Offline,     // 离线
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Online => "online",
            MachineStatus::Maintenance => "maintenance",
            MachineStatus::Offline => "offline",
        }
    }

    /// 宽松解析：未知值返回 None（由调用方决定忽略或回退默认值）
    pub fn parse_lenient(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MachineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(MachineStatus::Online),
            "maintenance" => Ok(MachineStatus::Maintenance),
            "offline" => Ok(MachineStatus::Offline),
            other => Err(format!("未知机台状态: {}", other)),
        }
    }
}

// ==========================================
// 队列移动方向 (Move Direction)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,   // 向队首移动
    Down, // 向队尾移动
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveDirection::Up => write!(f, "up"),
            MoveDirection::Down => write!(f, "down"),
        }
    }
}

impl FromStr for MoveDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(MoveDirection::Up),
            "down" => Ok(MoveDirection::Down),
            other => Err(format!("未知移动方向: {}", other)),
        }
    }
}

// ==========================================
// 告警类型与级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Maintenance, // 机台维护
    Stock,       // 耗材补货
}

// 顺序: Warning < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}
