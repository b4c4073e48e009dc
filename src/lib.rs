//! AVANS - WhatsApp 企业助手
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **session**: 会话状态机后端（按用户加锁 + 过期定时器）
//! - **limiter**: 冷却表 + 在途标记（anti-spam / 并发去重）
//! - **intent**: 自由文本的规则意图识别（pieza / orden / estatus）
//! - **domain**: 库存与订单查询（SQLite / 内存实现）
//! - **ai**: AI 协作层（Ollama / Mock）与轻量知识库
//! - **responses**: 用户文案与 interactive 消息构造
//! - **router**: 消息路由核心（状态机 + 自由文本策略链）
//! - **delivery**: 出站投递节奏控制
//! - **transport**: WhatsApp Cloud API 客户端
//! - **analytics**: 交互 JSONL 旁路日志
//! - **server**: axum Webhook 服务器

pub mod ai;
pub mod analytics;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod intent;
pub mod limiter;
pub mod observability;
pub mod responses;
pub mod router;
pub mod server;
pub mod session;
pub mod transport;
pub mod util;

pub use error::{BotError, Result};
