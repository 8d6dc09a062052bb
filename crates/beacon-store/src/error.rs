use thiserror::Error;

/// 遥测存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 记录未找到
    #[error("Not found: {0}")]
    NotFound(String),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 验证错误
    #[error("Validation error: {0}")]
    Validation(String),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 遥测存储结果类型
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// 创建验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}
