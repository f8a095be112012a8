// ==========================================
// 生产订单追踪系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 工单状态机 + 工位扫码工作流引擎
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 工作流规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// 读模型轮询
pub mod poller;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{JobState, OptiMode, ScanType, StationName};

// 领域实体
pub use domain::{AuditEvent, AuditEventType, Job, NewJob, OrderSummary, RawScan, ScanEvent, Topology};

// 引擎
pub use engine::{
    AuditTrailRecorder, DwellTimeGate, EngineError, JobEvent, JobStateMachine,
    OperatorActionHandler, ScanIngestor, ScanResult, StationSequenceValidator,
};

// API
pub use api::{ApiError, JobApi, ScanApi};

// 轮询
pub use poller::{PollUpdate, PollerHandle, ResilientPoller};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产订单追踪系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
