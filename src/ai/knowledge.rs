//! 轻量知识库
//!
//! JSONL 持久化的知识片段 + 词重叠检索。给 "memoria:" 指令和
//! search_with_context 提供底座。文件缺失或损坏按空库处理，不报错。

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 一条知识片段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub texto: String,
    pub fuente: String,
    pub fecha: String,
}

/// 文件支撑的知识库；条目常驻内存，追加时同步落盘
pub struct KnowledgeBase {
    path: PathBuf,
    entries: RwLock<Vec<KnowledgeEntry>>,
}

impl KnowledgeBase {
    /// 加载已有条目；无法解析的行跳过
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = std::fs::read_to_string(&path)
            .map(|content| {
                content
                    .lines()
                    .filter_map(|line| serde_json::from_str(line).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// 追加一条知识并落盘
    pub fn append(&self, text: &str, source: &str) -> Result<()> {
        let entry = KnowledgeEntry {
            texto: text.to_string(),
            fuente: source.to_string(),
            fecha: chrono::Local::now().to_rfc3339(),
        };

        let line = serde_json::to_string(&entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;

        self.entries.write().unwrap().push(entry);
        Ok(())
    }

    /// 词重叠检索：返回得分最高的 k 条片段拼接文本；无相关内容返回 None
    pub fn search(&self, query: &str, k: usize) -> Option<String> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return None;
        }

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(usize, &KnowledgeEntry)> = entries
            .iter()
            .map(|entry| {
                let tokens = tokenize(&entry.texto);
                let score = query_tokens.iter().filter(|t| tokens.contains(*t)).count();
                (score, entry)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        if scored.is_empty() {
            return None;
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let context = scored
            .iter()
            .take(k)
            .map(|(_, entry)| entry.texto.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");
        Some(context)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_kb() -> (tempfile::TempDir, KnowledgeBase) {
        let dir = tempfile::tempdir().unwrap();
        let kb = KnowledgeBase::load(dir.path().join("conocimiento.jsonl"));
        (dir, kb)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, kb) = temp_kb();
        assert!(kb.is_empty());
        assert_eq!(kb.search("cualquier cosa", 3), None);
    }

    #[test]
    fn test_append_and_search() {
        let (_dir, kb) = temp_kb();
        kb.append("El motor diesel requiere revisión cada 500 horas", "manual")
            .unwrap();
        kb.append("Las tuercas se piden al proveedor del norte", "WhatsApp")
            .unwrap();

        let hit = kb.search("revisión del motor", 3).unwrap();
        assert!(hit.contains("motor diesel"));
        assert_eq!(kb.search("zzz inexistente", 3), None);
    }

    #[test]
    fn test_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conocimiento.jsonl");
        {
            let kb = KnowledgeBase::load(&path);
            kb.append("Las válvulas están en la bodega sur", "manual").unwrap();
        }
        let kb = KnowledgeBase::load(&path);
        assert_eq!(kb.len(), 1);
        assert!(kb.search("bodega válvulas", 3).is_some());
    }
}
