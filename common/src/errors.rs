use log::error;
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    // ==== 常规业务错误 ====
    #[error("{0}")]
    Validation(String),

    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    // ==== 系统错误 ====
    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => AppError::Unavailable("get db connection fail".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::Conflict(db_err.message().to_string()),
            e => {
                error!("{:?}", e);
                AppError::Database(e.to_string())
            }
        }
    }
}
