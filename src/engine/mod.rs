// ==========================================
// 生产订单追踪系统 - 引擎层
// ==========================================
// 职责: 实现工作流规则,不拼 SQL
// 红线: Engine 不拼 SQL; 拒绝必须带稳定错误码
// 红线: 配置快照由调用方显式传入
// ==========================================

pub mod audit_trail;
pub mod clock;
pub mod dwell_gate;
pub mod error;
pub mod events;
pub mod key_lock;
pub mod operator_actions;
pub mod scan_ingestor;
pub mod sequence_validator;
pub mod state_machine;

// 重导出核心引擎
pub use audit_trail::AuditTrailRecorder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use dwell_gate::DwellTimeGate;
pub use error::{EngineError, EngineResult};
pub use events::{
    JobChangeSource, JobChangedEvent, JobEventPublisher, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use key_lock::{KeyGuard, KeyedLocks};
pub use operator_actions::{Actor, Authorizer, Capability, CapabilityAuthorizer, OperatorActionHandler};
pub use scan_ingestor::{AcceptedScan, ScanIngestor, ScanResult};
pub use sequence_validator::{SequencePosition, StationSequenceValidator};
pub use state_machine::{JobEvent, JobStateMachine, TransitionOrigin};
