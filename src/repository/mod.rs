// ==========================================
// 生产订单追踪系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 审计/扫码只追加,不提供修改与删除接口
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod audit_event_repo;
pub mod error;
pub mod job_repo;
pub mod scan_event_repo;
pub mod station_repo;

// 重导出核心仓储
pub use audit_event_repo::AuditEventRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use job_repo::JobRepository;
pub use scan_event_repo::ScanEventRepository;
pub use station_repo::StationRepository;
