// ==========================================
// 生产订单追踪系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换 Engine/Repository 错误为用户友好的错误消息
// 分类:
// - Rejected: 业务拒绝,带稳定错误码,由操作员处理 (重扫/稍后再试)
// - 其余: 单次请求失败,不在服务端自动重试
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务拒绝
    // ==========================================
    /// 扫码/迁移被拒绝 (code 为稳定的机器可读错误码)
    #[error("{message}")]
    Rejected {
        code: String,
        message: String,
        remaining_seconds: Option<i64>,
    },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("请求超时: {0}")]
    Timeout(String),

    #[error("并发冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误码 (与 EngineError::code 一致)
    pub fn code(&self) -> &str {
        match self {
            ApiError::Rejected { code, .. } => code,
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_)
            | ApiError::Other(_) => "STORAGE_ERROR",
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        if err.is_operator_recoverable() {
            return ApiError::Rejected {
                code: err.code().to_string(),
                message: err.to_string(),
                remaining_seconds: err.remaining_seconds(),
            };
        }

        match err {
            EngineError::JobNotFound(id) => ApiError::NotFound(format!("工单(id={})不存在", id)),
            EngineError::Timeout(msg) => ApiError::Timeout(msg),
            EngineError::Conflict(msg) => ApiError::Conflict(msg),
            EngineError::Storage(repo) => repo.into(),
            other => ApiError::Other(anyhow::anyhow!(other.to_string())),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => ApiError::Conflict(format!(
                "{}(id={})已被其他请求修改（期望revision={}，实际revision={}）",
                entity, id, expected, actual
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
