// ==========================================
// 生产订单追踪系统 - 领域类型定义
// ==========================================
// 职责: 工单状态、优化模式、扫码类型、工位名称
// 红线: 状态字符串是对外兼容面,不得改名
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工单状态 (Job State)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库、前端一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    New,          // 新建
    Prepared,     // 已准备
    OptiImported, // 优化数据已导入
    OptiRunning,  // 优化运行中
    OptiDone,     // 优化完成
    XmlReady,     // XML 已生成
    Delivered,    // 已交付
    Done,         // 完成
    Hold,         // 挂起,等待人工审批
    Failed,       // 失败
}

impl JobState {
    /// 全部状态 (按流水线顺序)
    pub const ALL: [JobState; 10] = [
        JobState::New,
        JobState::Prepared,
        JobState::OptiImported,
        JobState::OptiRunning,
        JobState::OptiDone,
        JobState::XmlReady,
        JobState::Delivered,
        JobState::Done,
        JobState::Hold,
        JobState::Failed,
    ];

    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Prepared => "PREPARED",
            JobState::OptiImported => "OPTI_IMPORTED",
            JobState::OptiRunning => "OPTI_RUNNING",
            JobState::OptiDone => "OPTI_DONE",
            JobState::XmlReady => "XML_READY",
            JobState::Delivered => "DELIVERED",
            JobState::Done => "DONE",
            JobState::Hold => "HOLD",
            JobState::Failed => "FAILED",
        }
    }

    /// 从字符串解析 (未知值返回 None,不做默认回退)
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        JobState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == normalized)
    }

    /// 是否允许扫码推进工位进度
    pub fn accepts_scans(&self) -> bool {
        !matches!(self, JobState::Failed | JobState::Hold | JobState::Done)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 优化模式 (Opti Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptiMode {
    A,
    B,
    C,
}

impl fmt::Display for OptiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptiMode::A => write!(f, "A"),
            OptiMode::B => write!(f, "B"),
            OptiMode::C => write!(f, "C"),
        }
    }
}

impl OptiMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(OptiMode::A),
            "B" => Some(OptiMode::B),
            "C" => Some(OptiMode::C),
            _ => None,
        }
    }
}

// ==========================================
// 扫码类型 (Scan Type)
// ==========================================
// ORDER: 整单条码, PART: 零件条码 (必须带 part_id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanType {
    Order,
    Part,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Order => write!(f, "ORDER"),
            ScanType::Part => write!(f, "PART"),
        }
    }
}

impl ScanType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ORDER" => Some(ScanType::Order),
            "PART" => Some(ScanType::Part),
            _ => None,
        }
    }
}

// ==========================================
// 工位名称 (Station Name)
// ==========================================
// 固定词表; TESLİMAT 同时接受无点写法 TESLIMAT 作为输入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationName {
    #[serde(rename = "HAZIRLIK")]
    Hazirlik, // 准备
    #[serde(rename = "EBATLAMA")]
    Ebatlama, // 开料
    #[serde(rename = "BANTLAMA")]
    Bantlama, // 封边
    #[serde(rename = "KONTROL")]
    Kontrol, // 质检
    #[serde(rename = "TESLİMAT", alias = "TESLIMAT")]
    Teslimat, // 交付
}

impl StationName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationName::Hazirlik => "HAZIRLIK",
            StationName::Ebatlama => "EBATLAMA",
            StationName::Bantlama => "BANTLAMA",
            StationName::Kontrol => "KONTROL",
            StationName::Teslimat => "TESLİMAT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "HAZIRLIK" => Some(StationName::Hazirlik),
            "EBATLAMA" => Some(StationName::Ebatlama),
            "BANTLAMA" => Some(StationName::Bantlama),
            "KONTROL" => Some(StationName::Kontrol),
            "TESLİMAT" | "TESLIMAT" => Some(StationName::Teslimat),
            _ => None,
        }
    }
}

impl fmt::Display for StationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
