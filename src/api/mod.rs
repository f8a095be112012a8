// ==========================================
// 生产订单追踪系统 - API层
// ==========================================
// 职责: 请求/响应 DTO, 错误 → 用户可读消息
// 说明: 传输层 (HTTP) 不在本 crate 内
// ==========================================

pub mod error;
pub mod job_api;
pub mod scan_api;

pub use error::{ApiError, ApiResult};
pub use job_api::{JobApi, JobDetail};
pub use scan_api::{ScanApi, ScanRequest, ScanResponse};
