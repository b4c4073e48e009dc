//! Mock AI 客户端（用于测试，无需后端）
//!
//! 回显问题文本；save_to_memory 记录到内存供断言。

use std::sync::Mutex;

use async_trait::async_trait;

use super::AiClient;
use crate::error::{BotError, Result};

pub struct MockAiClient {
    available: bool,
    /// search_with_context 的预置命中
    context_hit: Option<String>,
    saved: Mutex<Vec<(String, String)>>,
}

impl Default for MockAiClient {
    fn default() -> Self {
        Self {
            available: true,
            context_hit: None,
            saved: Mutex::new(Vec::new()),
        }
    }
}

impl MockAiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    pub fn with_context_hit(hit: &str) -> Self {
        Self {
            context_hit: Some(hit.to_string()),
            ..Self::default()
        }
    }

    /// 已保存的 (texto, fuente) 对
    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(BotError::AiUnavailable("mock offline".to_string()))
        }
    }
}

#[async_trait]
impl AiClient for MockAiClient {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn ask(&self, question: &str) -> Result<String> {
        self.check()?;
        Ok(format!("respuesta simulada a: {}", question))
    }

    async fn ask_with_context(&self, question: &str, _context: &str) -> Result<String> {
        self.check()?;
        Ok(format!("respuesta con contexto a: {}", question))
    }

    async fn search_with_context(&self, _query: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.context_hit.clone())
    }

    async fn save_to_memory(&self, text: &str, source: &str) -> Result<()> {
        self.check()?;
        self.saved
            .lock()
            .unwrap()
            .push((text.to_string(), source.to_string()));
        Ok(())
    }

    async fn analyze_image(&self, reference: &str) -> Result<String> {
        self.check()?;
        Ok(format!("descripción simulada de {}", reference))
    }
}
