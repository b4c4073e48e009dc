//! 响应构造
//!
//! 把领域查询结果转成面向用户的消息列表。纯函数，无 I/O。
//! 交互式消息（菜单按钮、Sí/No）序列化为 WhatsApp interactive JSON，
//! 由投递层按首字符 `{` 识别并选择发送方式。

use serde_json::json;

use crate::domain::{OrderInfo, PartDetail, PartStatusDetail};

/// 面向用户文案的集中构造器（品牌名可配置）
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    brand: String,
}

impl ResponseBuilder {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
        }
    }

    /// 主菜单：最多 3 个 reply 按钮（WhatsApp 上限），id 为 menubtn1..3
    pub fn main_menu(&self) -> String {
        let options = ["Consultar Piezas", "Ver Estatus", "Consultar Órdenes"];
        let buttons: Vec<_> = options
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, option)| {
                json!({
                    "type": "reply",
                    "reply": {
                        "id": format!("menubtn{}", i + 1),
                        // 按钮标题上限 20 字符
                        "title": option.chars().take(20).collect::<String>()
                    }
                })
            })
            .collect();

        json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": {"text": "Hola, ¿en qué puedo ayudarte? ✨"},
                "footer": {"text": format!("Equipo {}", self.brand)},
                "action": {"buttons": buttons}
            }
        })
        .to_string()
    }

    /// Sí/No 按钮对；context 用于区分回调 id（postconsulta / poststatus / postorden）
    pub fn yes_no_question(&self, question: &str, context: &str) -> String {
        json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": {"text": question},
                "footer": {"text": format!("Equipo {}", self.brand)},
                "action": {
                    "buttons": [
                        {"type": "reply", "reply": {"id": format!("{}_yes", context), "title": "Sí"}},
                        {"type": "reply", "reply": {"id": format!("{}_no", context), "title": "No"}}
                    ]
                }
            }
        })
        .to_string()
    }

    /// pieza 查询结果，按基数分形：
    /// 1 条 → 完整明细（含各仓库可用量）；2-5 条 → 编号列表；
    /// 更多 → 前 5 条 + 剩余数量提示
    pub fn parts_response(&self, parts: &[PartDetail]) -> Vec<String> {
        if parts.is_empty() {
            return vec!["⚠️ No se encontraron piezas con ese nombre o código.".to_string()];
        }

        if parts.len() == 1 {
            return vec![format_single_part(&parts[0])];
        }

        if parts.len() <= 5 {
            let mut message = "🔍 *Piezas encontradas:*\n\n".to_string();
            for (i, part) in parts.iter().enumerate() {
                message.push_str(&format_part_summary(part, i + 1));
                message.push_str("\n\n");
            }
            return vec![message.trim_end().to_string()];
        }

        let mut message = format!(
            "🔍 Encontré {} piezas. Aquí están las primeras 5:\n\n",
            parts.len()
        );
        for (i, part) in parts.iter().take(5).enumerate() {
            message.push_str(&format_part_summary(part, i + 1));
            message.push('\n');
        }
        message.push_str(&format!("\n... y {} más.", parts.len() - 5));
        vec![message]
    }

    /// estatus 查询结果
    pub fn status_response(&self, parts: &[PartStatusDetail]) -> Vec<String> {
        if parts.is_empty() {
            return vec!["⚠️ No se encontró esa pieza para consultar estatus.".to_string()];
        }

        let mut message = "🛠️ *Estatus de piezas:*\n\n".to_string();
        for part in parts {
            message.push_str(&format_part_status(part));
            message.push_str("\n\n");
        }
        vec![message.trim_end().to_string()]
    }

    /// orden 明细
    pub fn order_response(&self, order: &OrderInfo) -> Vec<String> {
        vec![format!(
            "📄 *Orden #{} - {}*\n💰 Pagado: *{}*\n🧾 Facturado: *{}*\n🚚 Entregado: *{}*",
            order.doc_num, order.customer, order.paid, order.invoiced, order.delivered
        )]
    }

    /// órdenes por cliente（自由文本链的第三级）
    pub fn orders_by_client_response(&self, client: &str, orders: &[OrderInfo]) -> Vec<String> {
        if orders.is_empty() {
            return vec![format!("⚠️ No encontré órdenes para el cliente '{}'.", client)];
        }
        let mut message = format!("📦 *Órdenes de {}:*\n\n", orders[0].customer);
        for order in orders {
            message.push_str(&format!(
                "📄 Orden #{} — Pagado: {} | Facturado: {} | Entregado: {}\n",
                order.doc_num, order.paid, order.invoiced, order.delivered
            ));
        }
        vec![message.trim_end().to_string()]
    }

    /// AI 回答统一加品牌前缀
    pub fn ai_response(&self, text: &str) -> String {
        format!("🤖 *Asistente {}:*\n\n{}", self.brand, text)
    }

    /// BD 结果 + AI 补充信息的组合消息（自由文本链第一级）
    pub fn ai_enriched_response(&self, db_result: &str, extra: Option<&str>) -> String {
        match extra {
            Some(extra) => format!(
                "🤖 *Asistente {}:*\n\n{}\n\n💡 *Información adicional:*\n{}",
                self.brand, db_result, extra
            ),
            None => format!("🤖 *Asistente {}:*\n\n{}", self.brand, db_result),
        }
    }

    pub fn part_prompt(&self) -> String {
        "🔍 Escribe el nombre o código de la pieza que deseas consultar.".to_string()
    }

    pub fn status_prompt(&self) -> String {
        "🛠️ Escribe el nombre o código de la pieza para consultar su estatus.".to_string()
    }

    pub fn order_prompt(&self) -> String {
        "📦 Escribe el número de orden que deseas consultar.".to_string()
    }

    pub fn order_must_be_numeric(&self) -> String {
        "⚠️ El número de orden debe ser numérico. Intenta nuevamente.".to_string()
    }

    pub fn order_not_found(&self) -> String {
        "⚠️ No se encontró una orden con ese número.".to_string()
    }

    pub fn farewell(&self) -> String {
        format!(
            "✅ Perfecto. Escribe *hola* si necesitas algo más. ¡Gracias por usar {}!",
            self.brand
        )
    }

    pub fn error_message(&self) -> String {
        "❌ Ocurrió un error procesando tu consulta. Escribe *hola* para volver al menú principal."
            .to_string()
    }

    pub fn help_message(&self) -> String {
        format!(
            "ℹ️ *Comandos disponibles:*\n\n\
             🔍 *consulta* - Buscar piezas por nombre o código\n\
             🛠️ *estatus* - Consultar estatus de piezas\n\
             📄 *ordenes* - Consultar información de órdenes\n\
             🧠 *memoria: [texto]* - Guardar conocimiento\n\n\
             💡 También puedes hacer preguntas libres sobre SAP y {}.\n\n\
             Escribe *hola* para volver al menú principal.",
            self.brand
        )
    }

    pub fn image_unavailable(&self) -> String {
        "📷 Imagen recibida. Describe el contenido por texto para ayudarte mejor.".to_string()
    }

    pub fn image_failed(&self) -> String {
        "⚠️ No se pudo procesar la imagen.".to_string()
    }

    pub fn image_analysis(&self, analysis: &str) -> String {
        format!("🖼️ *Análisis de imagen:*\n{}", analysis)
    }

    pub fn memory_saved(&self, text: &str, source: &str) -> String {
        let preview: String = text.chars().take(100).collect();
        format!("🧠 Conocimiento guardado:\n*{}...*\n📁 Fuente: {}", preview, source)
    }

    pub fn memory_failed(&self) -> String {
        "⚠️ No se pudo guardar el conocimiento.".to_string()
    }

    /// pieza 没查到但知识库给出了相关信息
    pub fn part_not_found_with_context(&self, context: &str) -> String {
        format!(
            "⚠️ No encontré esa pieza en la base de datos.\n\n🧠 *Info relacionada:*\n{}",
            context
        )
    }
}

fn format_single_part(part: &PartDetail) -> String {
    let mut message = format!(
        "📦 *{}*\n🔢 *Código:* `{}`\n",
        part.record.name, part.record.code
    );
    if part.availability.is_empty() {
        message.push_str("\n⚠️ Sin stock disponible");
    } else {
        message.push_str("\nℹ️ *Disponibilidad:*\n");
        for item in &part.availability {
            message.push_str(&format!("• {}: {} unidades\n", item.warehouse, item.quantity));
        }
    }
    message.trim_end().to_string()
}

fn format_part_summary(part: &PartDetail, index: usize) -> String {
    let mut name = part.record.name.clone();
    if name.chars().count() > 30 {
        name = name.chars().take(27).collect::<String>() + "...";
    }
    format!("{}. *{}* (`{}`)", index, name, part.record.code)
}

fn format_part_status(part: &PartStatusDetail) -> String {
    let mut message = format!(
        "📦 *{}*\n🔢 *Código:* `{}`\n",
        part.record.name, part.record.code
    );
    match &part.status {
        Some(status) => {
            message.push_str(&format!(
                "📊 *Estatus:* {}\n🕐 *Actualizado:* {}",
                status.stage, status.updated
            ));
        }
        None => message.push_str("⚠️ Sin información de estatus"),
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Availability, PartRecord, PartStatus};

    fn part(id: i64, name: &str, code: &str, stock: &[(&str, i64)]) -> PartDetail {
        PartDetail {
            record: PartRecord {
                id,
                name: name.to_string(),
                code: code.to_string(),
            },
            availability: stock
                .iter()
                .map(|(w, q)| Availability {
                    warehouse: w.to_string(),
                    quantity: *q,
                })
                .collect(),
        }
    }

    fn builder() -> ResponseBuilder {
        ResponseBuilder::new("AVANS")
    }

    #[test]
    fn test_parts_empty_is_not_found() {
        let msgs = builder().parts_response(&[]);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("No se encontraron piezas"));
    }

    #[test]
    fn test_single_part_has_code_and_warehouses() {
        let msgs = builder().parts_response(&[part(
            1,
            "tornillo hexagonal",
            "TRN-100",
            &[("BOD-NORTE", 15), ("BOD-SUR", 3)],
        )]);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("`TRN-100`"));
        assert!(msgs[0].contains("BOD-NORTE: 15 unidades"));
        assert!(msgs[0].contains("BOD-SUR: 3 unidades"));
    }

    #[test]
    fn test_single_part_without_stock() {
        let msgs = builder().parts_response(&[part(1, "tuerca", "TRC-20", &[])]);
        assert!(msgs[0].contains("Sin stock disponible"));
    }

    #[test]
    fn test_three_parts_enumerated() {
        let parts: Vec<_> = (1..=3)
            .map(|i| part(i, &format!("pieza {}", i), &format!("P-{}", i), &[]))
            .collect();
        let msgs = builder().parts_response(&parts);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("1. *pieza 1*"));
        assert!(msgs[0].contains("3. *pieza 3*"));
    }

    #[test]
    fn test_six_parts_render_five_plus_notice() {
        let parts: Vec<_> = (1..=6)
            .map(|i| part(i, &format!("pieza {}", i), &format!("P-{}", i), &[]))
            .collect();
        let msgs = builder().parts_response(&parts);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("5. *pieza 5*"));
        assert!(!msgs[0].contains("6. *pieza 6*"));
        assert!(msgs[0].contains("... y 1 más."));
    }

    #[test]
    fn test_status_without_info() {
        let detail = PartStatusDetail {
            record: PartRecord {
                id: 1,
                name: "tuerca".to_string(),
                code: "TRC-20".to_string(),
            },
            status: None,
        };
        let msgs = builder().status_response(&[detail]);
        assert!(msgs[0].contains("Sin información de estatus"));
    }

    #[test]
    fn test_status_with_info() {
        let detail = PartStatusDetail {
            record: PartRecord {
                id: 1,
                name: "motor".to_string(),
                code: "MTR-1".to_string(),
            },
            status: Some(PartStatus {
                stage: "en producción".to_string(),
                updated: "2024-05-01".to_string(),
            }),
        };
        let msgs = builder().status_response(&[detail]);
        assert!(msgs[0].contains("*Estatus:* en producción"));
        assert!(msgs[0].contains("2024-05-01"));
    }

    #[test]
    fn test_order_response_fields() {
        let msgs = builder().order_response(&OrderInfo {
            doc_num: 4521,
            customer: "Constructora Maya".to_string(),
            paid: "80%".to_string(),
            invoiced: "100%".to_string(),
            delivered: "50%".to_string(),
        });
        assert!(msgs[0].contains("Orden #4521"));
        assert!(msgs[0].contains("Pagado: *80%*"));
        assert!(msgs[0].contains("Entregado: *50%*"));
    }

    #[test]
    fn test_interactive_payloads_are_json_shaped() {
        let b = builder();
        let menu = b.main_menu();
        assert!(menu.starts_with('{'));
        let parsed: serde_json::Value = serde_json::from_str(&menu).unwrap();
        let buttons = parsed
            .pointer("/interactive/action/buttons")
            .and_then(|v| v.as_array())
            .unwrap();
        assert_eq!(buttons.len(), 3);
        assert_eq!(buttons[0].pointer("/reply/id").unwrap(), "menubtn1");

        let yes_no = b.yes_no_question("¿Consultar otra pieza?", "postconsulta");
        let parsed: serde_json::Value = serde_json::from_str(&yes_no).unwrap();
        assert_eq!(
            parsed.pointer("/interactive/action/buttons/0/reply/id").unwrap(),
            "postconsulta_yes"
        );
    }
}
