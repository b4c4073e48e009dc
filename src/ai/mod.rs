//! AI 协作层
//!
//! 所有后端实现 AiClient：自由问答、带上下文问答、知识库检索增强、
//! 保存知识、图像分析。后端视为缓慢且可能不可用的黑盒：任何错误由
//! 路由层降级为静态文案，绝不让故障冒泡到用户。

mod knowledge;
mod mock;
mod ollama;

pub use knowledge::KnowledgeBase;
pub use mock::MockAiClient;
pub use ollama::OllamaClient;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;

/// AI 客户端 trait
#[async_trait]
pub trait AiClient: Send + Sync {
    /// 后端是否可用；不可用时相关分支降级为静态文案
    fn is_available(&self) -> bool;

    /// 直接提问
    async fn ask(&self, question: &str) -> Result<String>;

    /// 带附加上下文提问
    async fn ask_with_context(&self, question: &str, context: &str) -> Result<String>;

    /// 知识库检索 + 生成；知识库无相关内容时返回 None
    async fn search_with_context(&self, query: &str) -> Result<Option<String>>;

    /// 保存一条知识（"memoria:" / "agregar:" 指令）
    async fn save_to_memory(&self, text: &str, source: &str) -> Result<()>;

    /// 图像分析（media 引用 → 描述文本）
    async fn analyze_image(&self, reference: &str) -> Result<String>;
}

static BOLD_RE: OnceLock<Regex> = OnceLock::new();
static NEWLINES_RE: OnceLock<Regex> = OnceLock::new();
static SPACES_RE: OnceLock<Regex> = OnceLock::new();
static PREAMBLE_RE: OnceLock<Regex> = OnceLock::new();

/// 清洗模型输出：markdown 粗体转 WhatsApp 格式、压缩空白、去掉套话开头、
/// 超长时按句子 / 行边界截断、保证以标点收尾。太短视为无效回答。
pub fn clean_response(raw: &str, max_chars: usize) -> String {
    let bold = BOLD_RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
    let newlines = NEWLINES_RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap());
    let spaces = SPACES_RE.get_or_init(|| Regex::new(r"\s{3,}").unwrap());
    let preamble = PREAMBLE_RE.get_or_init(|| {
        Regex::new(r"(?i)^(respuesta|como asistente|en resumen|hola|buenos días|buenas tardes)[:.]?\s*")
            .unwrap()
    });

    let mut cleaned = raw.trim().to_string();
    cleaned = bold.replace_all(&cleaned, "*$1*").into_owned();
    cleaned = newlines.replace_all(&cleaned, "\n\n").into_owned();
    cleaned = spaces.replace_all(&cleaned, " ").into_owned();
    cleaned = preamble.replace(&cleaned, "").trim().to_string();

    if cleaned.chars().count() > max_chars {
        cleaned = truncate_at_boundary(&cleaned, max_chars);
    }

    if !cleaned.is_empty()
        && !cleaned.ends_with(['.', '!', '?', ':'])
        && !cleaned.ends_with("...")
    {
        cleaned.push('.');
    }

    if cleaned.trim().chars().count() < 10 {
        return "Para consultas específicas sobre SAP, escribe 'hola' para ver el menú.".to_string();
    }

    cleaned
}

/// 截断到 max_chars 以内，优先在句号边界、其次行边界，都太靠前则硬切加省略号
fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    let truncated: String = text.chars().take(max_chars).collect();
    let threshold = max_chars * 7 / 10;

    for boundary in ['.', '\n'] {
        if let Some(idx) = truncated.rfind(boundary) {
            let chars_before = truncated[..idx].chars().count();
            if chars_before > threshold {
                let kept = if boundary == '.' { &truncated[..=idx] } else { &truncated[..idx] };
                return kept.trim_end().to_string();
            }
        }
    }

    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_converts_bold_and_strips_preamble() {
        let cleaned = clean_response("En resumen: usa la **transacción ME21N** para crear pedidos", 800);
        assert!(cleaned.contains("*transacción ME21N*"));
        assert!(!cleaned.to_lowercase().starts_with("en resumen"));
        assert!(cleaned.ends_with('.'));
    }

    #[test]
    fn test_clean_collapses_blank_runs() {
        let cleaned = clean_response("Paso uno.\n\n\n\nPaso dos.", 800);
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn test_clean_truncates_at_sentence() {
        let raw = format!("{} Fin de la primera. {}", "x".repeat(500), "y".repeat(600));
        let cleaned = clean_response(&raw, 800);
        // 硬切时会追加省略号
        assert!(cleaned.chars().count() <= 803);
        assert!(cleaned.ends_with('.') || cleaned.ends_with("..."));
    }

    #[test]
    fn test_clean_rejects_too_short() {
        let cleaned = clean_response("ok", 800);
        assert!(cleaned.contains("escribe 'hola'"));
        let cleaned = clean_response("", 800);
        assert!(cleaned.contains("escribe 'hola'"));
    }
}
