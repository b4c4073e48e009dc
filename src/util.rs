//! 文本与号码处理工具
//!
//! Webhook 载荷的文本提取、电话号码前缀修正、输入校验、日志脱敏。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// 从原始消息载荷中提取文本，统一转小写
///
/// 支持 text / button / interactive（list_reply、button_reply）；
/// 非文本类型返回占位词（"imagen"、"documento" 等），让路由层仍能给出回应。
pub fn extract_text(raw: &Value) -> String {
    let msg_type = raw.get("type").and_then(Value::as_str).unwrap_or("");

    match msg_type {
        "text" => raw
            .pointer("/text/body")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase(),
        "button" => {
            // payload 优先于展示文本
            let button = raw.get("button");
            button
                .and_then(|b| b.get("payload"))
                .and_then(Value::as_str)
                .or_else(|| button.and_then(|b| b.get("text")).and_then(Value::as_str))
                .unwrap_or("mensaje no procesado")
                .to_lowercase()
        }
        "interactive" => {
            let interactive = raw.get("interactive");
            let kind = interactive
                .and_then(|i| i.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("");
            match kind {
                "list_reply" => raw
                    .pointer("/interactive/list_reply/title")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_lowercase(),
                "button_reply" => raw
                    .pointer("/interactive/button_reply/title")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_lowercase(),
                _ => "mensaje no procesado".to_string(),
            }
        }
        "image" => "imagen".to_string(),
        "document" => "documento".to_string(),
        "audio" => "audio".to_string(),
        "video" => "video".to_string(),
        _ => "mensaje no procesado".to_string(),
    }
}

/// 修正不同国家的手机号前缀（墨西哥 521→52，阿根廷 549→54）
pub fn normalize_phone(phone: &str) -> String {
    if let Some(rest) = phone.strip_prefix("521") {
        format!("52{}", rest)
    } else if let Some(rest) = phone.strip_prefix("549") {
        format!("54{}", rest)
    } else {
        phone.to_string()
    }
}

/// 电话号码格式校验：纯数字、10-15 位
pub fn validate_phone(phone: &str) -> bool {
    let clean: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();
    !clean.is_empty()
        && clean.chars().all(|c| c.is_ascii_digit())
        && (10..=15).contains(&clean.len())
}

/// 订单号校验：纯数字且在 1..=999_999_999 范围内
pub fn validate_order_number(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    matches!(trimmed.parse::<u64>(), Ok(n) if (1..=999_999_999).contains(&n))
}

/// 判断文本是否像一个名称（客户名搜索的启发式）：
/// 至少 2 个字符、不是纯数字、含至少一个字母
pub fn looks_like_name(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().count() >= 2
        && !trimmed.chars().all(|c| c.is_ascii_digit())
        && trimmed.chars().any(|c| c.is_alphabetic())
}

static PHONE_RE: OnceLock<Regex> = OnceLock::new();
static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

/// 日志脱敏：电话号码保留首尾 3 位，长 token 保留首尾 4 位
pub fn mask_sensitive(text: &str) -> String {
    let phone_re = PHONE_RE.get_or_init(|| Regex::new(r"\b\d{10,15}\b").unwrap());
    let token_re = TOKEN_RE.get_or_init(|| Regex::new(r"\b[A-Za-z0-9]{20,}\b").unwrap());

    let masked = phone_re.replace_all(text, |caps: &regex::Captures| {
        let m = &caps[0];
        format!("{}{}{}", &m[..3], "*".repeat(m.len() - 6), &m[m.len() - 3..])
    });
    token_re
        .replace_all(&masked, |caps: &regex::Captures| {
            let m = &caps[0];
            format!("{}{}{}", &m[..4], "*".repeat(8), &m[m.len() - 4..])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_body() {
        let raw = json!({"type": "text", "text": {"body": "Hola Mundo"}});
        assert_eq!(extract_text(&raw), "hola mundo");
    }

    #[test]
    fn test_extract_button_payload_wins() {
        let raw = json!({"type": "button", "button": {"payload": "menubtn1", "text": "Consultar"}});
        assert_eq!(extract_text(&raw), "menubtn1");
    }

    #[test]
    fn test_extract_interactive_button_reply() {
        let raw = json!({
            "type": "interactive",
            "interactive": {"type": "button_reply", "button_reply": {"id": "postconsulta_yes", "title": "Sí"}}
        });
        assert_eq!(extract_text(&raw), "sí");
    }

    #[test]
    fn test_extract_media_placeholders() {
        assert_eq!(extract_text(&json!({"type": "image"})), "imagen");
        assert_eq!(extract_text(&json!({"type": "document"})), "documento");
        assert_eq!(extract_text(&json!({"type": "sticker"})), "mensaje no procesado");
        assert_eq!(extract_text(&json!({})), "mensaje no procesado");
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("5215512345678"), "525512345678");
        assert_eq!(normalize_phone("5491112345678"), "541112345678");
        assert_eq!(normalize_phone("34612345678"), "34612345678");
    }

    #[test]
    fn test_validate_order_number() {
        assert!(validate_order_number("4521"));
        assert!(validate_order_number(" 999999999 "));
        assert!(!validate_order_number("0"));
        assert!(!validate_order_number("1000000000"));
        assert!(!validate_order_number("abc"));
        assert!(!validate_order_number("12a3"));
        assert!(!validate_order_number(""));
    }

    #[test]
    fn test_looks_like_name() {
        assert!(looks_like_name("constructora maya"));
        assert!(looks_like_name("ab"));
        assert!(!looks_like_name("12345"));
        assert!(!looks_like_name("x"));
        assert!(!looks_like_name("--"));
    }

    #[test]
    fn test_mask_sensitive() {
        let masked = mask_sensitive("numero 5215512345678 listo");
        assert!(masked.contains("521"));
        assert!(masked.contains("678"));
        assert!(!masked.contains("5512345"));
    }
}
