//! 交互分析日志
//!
//! 每处理一条消息追加一行 JSONL：{tipo, mensaje, respuesta, contexto, fecha}。
//! 这是尽力而为的旁路：写失败只记日志，绝不影响用户可见的响应路径。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// 一条交互记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    /// 分类标签，如 "text-whatsapp" / "image-whatsapp"
    pub tipo: String,
    pub mensaje: String,
    pub respuesta: String,
    /// 用户标识
    pub contexto: String,
    pub fecha: String,
}

impl InteractionRecord {
    pub fn new(tipo: &str, mensaje: &str, respuesta: &str, contexto: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tipo: tipo.to_string(),
            mensaje: mensaje.to_string(),
            respuesta: respuesta.to_string(),
            contexto: contexto.to_string(),
            fecha: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// 追加式 JSONL 日志
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn append(&self, record: &InteractionRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}
