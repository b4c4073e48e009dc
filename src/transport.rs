//! WhatsApp Cloud API 传输层
//!
//! 发送文本 / 交互式消息、标记已读、查询 media URL。长文本按 4000 字符
//! 分段发送（API 上限 4096）。发送失败只返回错误，重试策略由调用方决定
//! （本系统不重试）。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BotError, Result};

/// 出站消息传输接口
#[async_trait]
pub trait Transport: Send + Sync {
    /// 纯文本消息
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;

    /// 已序列化的 interactive JSON（由格式化层产出）
    async fn send_interactive(&self, to: &str, payload: &str) -> Result<()>;

    /// 标记消息已读
    async fn mark_read(&self, message_id: &str) -> Result<()>;

    /// media id → 可下载 URL；不存在返回 None
    async fn media_url(&self, media_id: &str) -> Result<Option<String>>;
}

/// WhatsApp Cloud API 发送消息请求体
#[derive(Debug, Serialize)]
struct SendTextRequest {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: String,
    #[serde(rename = "type")]
    msg_type: &'static str,
    text: SendTextBody,
}

#[derive(Debug, Serialize)]
struct SendTextBody {
    body: String,
}

pub struct WhatsAppClient {
    http: reqwest::Client,
    api_base: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsAppClient {
    pub fn new(api_base: &str, phone_number_id: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        let response = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::WhatsApp(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        // 消息长度上限 4096 字符，按 4000 分段
        let max_len = 4000usize;
        let chunks: Vec<String> = if body.chars().count() <= max_len {
            vec![body.to_string()]
        } else {
            body.chars()
                .collect::<Vec<_>>()
                .chunks(max_len)
                .map(|c| c.iter().collect())
                .collect()
        };

        for chunk in chunks {
            let request = SendTextRequest {
                messaging_product: "whatsapp",
                recipient_type: "individual",
                to: to.replace('+', ""),
                msg_type: "text",
                text: SendTextBody { body: chunk },
            };
            self.post(&serde_json::to_value(&request)?).await?;
        }
        Ok(())
    }

    async fn send_interactive(&self, to: &str, payload: &str) -> Result<()> {
        let mut parsed: Value = serde_json::from_str(payload)
            .map_err(|e| BotError::InvalidPayload(format!("interactive payload: {}", e)))?;
        let Some(object) = parsed.as_object_mut() else {
            return Err(BotError::InvalidPayload(
                "interactive payload is not an object".to_string(),
            ));
        };
        object.insert("to".to_string(), Value::String(to.replace('+', "")));
        self.post(&parsed).await
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id,
        });
        self.post(&payload).await
    }

    async fn media_url(&self, media_id: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.api_base, media_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }
        let data: Value = response.json().await?;
        Ok(data.get("url").and_then(Value::as_str).map(String::from))
    }
}
