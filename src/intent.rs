//! 意图识别模块
//!
//! 对自由文本做规则匹配（不调用 AI），识别出结构化的查询意图并交给
//! 领域查询层。三个规则族按固定顺序求值：pieza → orden → estatus，
//! 族内按声明顺序，第一条命中即返回。

use std::sync::OnceLock;

use regex::Regex;

/// 识别出的查询意图
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// 按名称 / código 查询 pieza（模糊搜索）
    Part(String),
    /// 按 número 查询 orden（精确数字键）
    Order(String),
    /// 查询 estatus de pieza
    Status(String),
}

static PART_RULES: OnceLock<Vec<Regex>> = OnceLock::new();
static ORDER_RULES: OnceLock<Vec<Regex>> = OnceLock::new();
static STATUS_RULES: OnceLock<Vec<Regex>> = OnceLock::new();

fn part_rules() -> &'static [Regex] {
    PART_RULES.get_or_init(|| {
        [
            r"(?:pieza|parte|componente|item|artículo)\s+(\w+)",
            r"código\s+(\w+)",
            r"disponibilidad\s+(?:del?\s+)?(\w+)",
            r"stock\s+(?:del?\s+)?(\w+)",
            r"inventario\s+(?:del?\s+)?(\w+)",
            r"cuánt[oa]s?\s+(?:tenemos|hay)\s+(?:del?\s+)?(\w+)",
            r"buscar\s+(\w+)",
            r"(\w+)\s+disponible",
            r"tenemos\s+(\w+)",
            r"hay\s+(\w+)",
            r"mostrar\s+(\w+)",
            r"información\s+(?:del?\s+)?(\w+)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn order_rules() -> &'static [Regex] {
    ORDER_RULES.get_or_init(|| {
        [
            r"orden\s+(\d+)",
            r"pedido\s+(\d+)",
            r"número\s+(\d+)",
            r"estado\s+(?:del?\s+)?(?:orden\s+)?(\d+)",
            r"facturación\s+(\d+)",
            r"entrega\s+(\d+)",
            r"consultar\s+(\d+)",
            r"ver\s+orden\s+(\d+)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn status_rules() -> &'static [Regex] {
    STATUS_RULES.get_or_init(|| {
        [
            r"estatus\s+(?:del?\s+)?(\w+)",
            r"estado\s+(?:del?\s+)?(\w+)",
            r"situación\s+(?:del?\s+)?(\w+)",
            r"cómo\s+está\s+(?:el\s+|la\s+)?(\w+)",
            r"actualización\s+(?:del?\s+)?(\w+)",
            r"proceso\s+(?:del?\s+)?(\w+)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// 检测文本中的查询意图；无命中返回 None
///
/// 纯函数，无 I/O。输入先统一转小写再匹配。
pub fn detect(text: &str) -> Option<Intent> {
    let lower = text.to_lowercase();

    for rule in part_rules() {
        if let Some(caps) = rule.captures(&lower) {
            return Some(Intent::Part(caps[1].to_string()));
        }
    }

    for rule in order_rules() {
        if let Some(caps) = rule.captures(&lower) {
            return Some(Intent::Order(caps[1].to_string()));
        }
    }

    for rule in status_rules() {
        if let Some(caps) = rule.captures(&lower) {
            return Some(Intent::Status(caps[1].to_string()));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_part_by_code() {
        assert_eq!(detect("código ABC123"), Some(Intent::Part("abc123".to_string())));
    }

    #[test]
    fn test_detect_part_trailing_disponible() {
        assert_eq!(detect("tornillo disponible"), Some(Intent::Part("tornillo".to_string())));
    }

    #[test]
    fn test_detect_part_with_article() {
        assert_eq!(detect("stock del motor"), Some(Intent::Part("motor".to_string())));
        assert_eq!(detect("disponibilidad de valvula"), Some(Intent::Part("valvula".to_string())));
    }

    #[test]
    fn test_detect_order() {
        assert_eq!(detect("orden 4521"), Some(Intent::Order("4521".to_string())));
        assert_eq!(detect("ver orden 88"), Some(Intent::Order("88".to_string())));
        assert_eq!(detect("estado de orden 12"), Some(Intent::Order("12".to_string())));
    }

    #[test]
    fn test_detect_status() {
        assert_eq!(detect("estatus del motor"), Some(Intent::Status("motor".to_string())));
        assert_eq!(detect("cómo está el compresor"), Some(Intent::Status("compresor".to_string())));
    }

    #[test]
    fn test_part_family_wins_over_status() {
        // "pieza" 规则族在前，即使文本同时提到 estatus
        assert_eq!(
            detect("estatus de la pieza bomba"),
            Some(Intent::Part("bomba".to_string()))
        );
    }

    #[test]
    fn test_no_intent() {
        assert_eq!(detect("buenos días"), None);
        assert_eq!(detect(""), None);
        assert_eq!(detect("gracias por todo"), None);
    }
}
