// ==========================================
// 生产订单追踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod audit;
pub mod job;
pub mod scan;
pub mod station;
pub mod types;

// 重导出核心类型
pub use audit::{AuditEvent, AuditEventType};
pub use job::{Job, NewJob, OpenSequence, OrderSummary};
pub use scan::{ParsedScan, RawScan, ScanEvent, SequenceKey};
pub use station::{
    device_group_keys, standard_station_id, DeviceGroup, DeviceStep, Station, Topology,
    DEFAULT_DWELL_MINUTES,
};
pub use types::{JobState, OptiMode, ScanType, StationName};
