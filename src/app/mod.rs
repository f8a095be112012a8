// ==========================================
// 生产订单追踪系统 - 应用层
// ==========================================
// 职责: 组装共享状态,供传输层 (HTTP/桌面) 使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
