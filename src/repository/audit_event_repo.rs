// ==========================================
// 生产订单追踪系统 - 审计事件数据仓储
// ==========================================
// 对齐: audit_event 表
// 红线: 只追加,不提供更新/删除接口
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::AuditEventRepository;
pub(crate) use self::core::insert_audit_event;
