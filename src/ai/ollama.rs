//! Ollama 后端
//!
//! 通过 HTTP 调用本地 Ollama（/api/chat，非流式）。回答经 clean_response
//! 清洗后返回；enabled=false 或网络故障时返回 AiUnavailable / Ai 错误，
//! 由路由层降级。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{clean_response, AiClient, KnowledgeBase};
use crate::config::AiSection;
use crate::error::{BotError, Result};

const SYSTEM_PROMPT: &str = "Eres el asistente experto de AVANS especializado en SAP, manuales y bases de datos.\n\
INSTRUCCIONES CRÍTICAS:\n\
- RESPONDE SIEMPRE EN ESPAÑOL\n\
- Da una respuesta COMPLETA y útil\n\
- Máximo 200 palabras\n\
- Si son pasos: incluye TODOS los pasos necesarios (máximo 6)\n\
- Sé específico y claro\n\
- NO uses frases como \"Como asistente\", \"En resumen\", etc.\n\
- Empieza directamente con la información útil";

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_response_chars: usize,
    enabled: bool,
    knowledge: KnowledgeBase,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(cfg: &AiSection) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            max_response_chars: cfg.max_response_chars,
            enabled: cfg.enabled,
            knowledge: KnowledgeBase::load(&cfg.knowledge_path),
        }
    }

    async fn chat(&self, user_prompt: &str) -> Result<String> {
        if !self.enabled {
            return Err(BotError::AiUnavailable("disabled by config".to_string()));
        }

        let url = format!("{}/api/chat", self.base_url);
        let messages = vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: user_prompt.to_string(),
            },
        ];
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {"temperature": 0.1}
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(BotError::Ai(format!(
                "ollama status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(clean_response(&parsed.message.content, self.max_response_chars))
    }
}

#[async_trait]
impl AiClient for OllamaClient {
    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn ask(&self, question: &str) -> Result<String> {
        self.chat(question).await
    }

    async fn ask_with_context(&self, question: &str, context: &str) -> Result<String> {
        let prompt = if context.is_empty() {
            question.to_string()
        } else {
            format!("{}\n\nPregunta del usuario: {}", context, question)
        };
        self.chat(&prompt).await
    }

    async fn search_with_context(&self, query: &str) -> Result<Option<String>> {
        let Some(context) = self.knowledge.search(query, 3) else {
            return Ok(None);
        };
        let prompt = format!("Basándote en esta información: {}\n\nResponde a: {}", context, query);
        self.chat(&prompt).await.map(Some)
    }

    async fn save_to_memory(&self, text: &str, source: &str) -> Result<()> {
        self.knowledge.append(text, source)
    }

    async fn analyze_image(&self, reference: &str) -> Result<String> {
        let context = self.knowledge.search(reference, 2);
        let prompt = match context {
            Some(context) => format!(
                "Imagen descrita como: '{}'. Contexto relacionado: {}. Analiza como experto en SAP.",
                reference, context
            ),
            None => format!("Como experto en SAP, analiza esta imagen: {}", reference),
        };
        self.chat(&prompt).await
    }
}
