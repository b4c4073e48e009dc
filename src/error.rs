//! 错误类型
//!
//! 按 collaborator 分类：WhatsApp 传输、数据库、AI 后端、Webhook 载荷、配置。
//! 路由层在各调用点捕获并降级（见 router.rs），不向用户泄露内部错误。

use thiserror::Error;

/// Bot 运行过程中可能出现的错误（传输、查询、AI、载荷解析等）
#[derive(Error, Debug)]
pub enum BotError {
    #[error("WhatsApp API error: {0}")]
    WhatsApp(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// AI 后端不可用（未启用或连接失败），功能降级而非崩溃
    #[error("AI backend unavailable: {0}")]
    AiUnavailable(String),

    #[error("AI error: {0}")]
    Ai(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
