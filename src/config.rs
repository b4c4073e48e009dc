//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AVANS__*` 覆盖（双下划线表示嵌套，
//! 如 `AVANS__SESSION__TIMEOUT_SECS=600`）。WhatsApp 访问令牌只从环境变量读取，
//! 不落盘。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub limiter: LimiterSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub whatsapp: WhatsappSection,
    #[serde(default)]
    pub delivery: DeliverySection,
    #[serde(default)]
    pub analytics: AnalyticsSection,
}

/// [app] 段：品牌名与监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 品牌名，出现在菜单 footer 等用户可见文案中
    pub brand: String,
    pub bind_addr: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            brand: "AVANS".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

/// [session] 段：会话超时与后台清扫
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 会话状态超时（秒），到期自动回到 Idle
    pub timeout_secs: u64,
    /// 后台清扫周期（秒）
    pub sweep_interval_secs: u64,
    /// 清扫时移除超过此闲置时长的会话（秒）
    pub sweep_max_age_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            sweep_interval_secs: 60,
            sweep_max_age_secs: 3600,
        }
    }
}

/// [limiter] 段：anti-spam 冷却窗口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimiterSection {
    /// 同一 (usuario, prefijo) 的最小响应间隔（秒）
    pub cooldown_secs: u64,
    /// 冷却表条目的最大保留时长（秒）
    pub purge_age_secs: u64,
    /// 超过此条目数时触发一次清理
    pub purge_threshold: usize,
}

impl Default for LimiterSection {
    fn default() -> Self {
        Self {
            cooldown_secs: 10,
            purge_age_secs: 600,
            purge_threshold: 100,
        }
    }
}

/// [database] 段：SQLite 路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("inventario.db"),
        }
    }
}

/// [ai] 段：Ollama 后端与知识库
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiSection {
    /// 关掉后所有 AI 功能降级为静态文案
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 响应长度上限（字符），超出按句子边界截断
    pub max_response_chars: usize,
    /// 知识库 JSONL 路径（"memoria:" 指令与检索增强）
    pub knowledge_path: PathBuf,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            request_timeout_secs: 60,
            max_response_chars: 800,
            knowledge_path: PathBuf::from("conocimiento.jsonl"),
        }
    }
}

/// [whatsapp] 段：Cloud API 端点
///
/// 访问令牌从环境变量 WHATSAPP_ACCESS_TOKEN 读取，不放配置文件。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsappSection {
    pub api_base: String,
    pub phone_number_id: String,
    /// Meta Webhook 验证令牌（GET /webhook handshake）
    pub verify_token: String,
}

impl Default for WhatsappSection {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com/v18.0".to_string(),
            phone_number_id: String::new(),
            verify_token: "avans".to_string(),
        }
    }
}

/// [delivery] 段：批量发送节奏
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliverySection {
    /// 同一批次相邻消息之间的间隔（毫秒）
    pub pacing_ms: u64,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self { pacing_ms: 500 }
    }
}

/// [analytics] 段：交互日志
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSection {
    pub path: PathBuf,
}

impl Default for AnalyticsSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("interacciones_log.jsonl"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            session: SessionSection::default(),
            limiter: LimiterSection::default(),
            database: DatabaseSection::default(),
            ai: AiSection::default(),
            whatsapp: WhatsappSection::default(),
            delivery: DeliverySection::default(),
            analytics: AnalyticsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 AVANS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AVANS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AVANS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
