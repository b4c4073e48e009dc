//! 消息路由核心
//!
//! 每条入站事件走一遍：限流检查 → 在途标记 → 标记已读 → 按会话状态分派
//! → 投递响应 → 记录交互。状态机转移表：
//!
//! - 任意状态：image → 图像分析分支；"memoria:"/"agregar:" → 知识保存分支
//! - Idle：问候词 / 裸 sí/no → 主菜单；consulta/estatus/ordenes → 进入对应
//!   Awaiting 流程；其余 → 自由文本策略链
//! - Awaiting* → 执行查询，有结果则进入对应 Post* 并追加 Sí/No 追问
//! - Post*：sí → 重启对应流程；no → 告别并清理；其余 → 回主菜单
//!
//! 自由文本策略链（依序尝试，第一个产出即停）：结构化意图查询 → 直接
//! pieza 搜索 → 按客户名搜索 órdenes → AI（知识库优先）→ 静态帮助。
//!
//! 错误策略：route 内任何未处理错误在 handle_event 顶层捕获，回复一条
//! 通用道歉；在途标记经 RAII guard 无条件释放；分析日志失败只记 warn。

use std::sync::Arc;

use serde_json::Value;

use crate::analytics::{InteractionLog, InteractionRecord};
use crate::ai::AiClient;
use crate::delivery::DeliveryCoordinator;
use crate::domain::DomainStore;
use crate::error::Result;
use crate::intent::{self, Intent};
use crate::limiter::RateLimiter;
use crate::responses::ResponseBuilder;
use crate::session::{SessionStore, UserState};
use crate::transport::Transport;
use crate::util::{looks_like_name, mask_sensitive, validate_order_number};

/// 一条入站事件的不可变上下文
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// 规范化文本（已转小写；非文本类型为占位词）
    pub text: String,
    /// 用户标识（número de teléfono，已规范化）
    pub user: String,
    pub message_id: String,
    pub display_name: String,
    pub message_type: String,
    /// 原始载荷（图像分支取 media id 用）
    pub raw: Value,
}

impl MessageContext {
    pub fn from_raw(raw: Value, user: &str, message_id: &str, display_name: &str) -> Self {
        let message_type = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Self {
            text: crate::util::extract_text(&raw),
            user: user.to_string(),
            message_id: message_id.to_string(),
            display_name: display_name.to_string(),
            message_type,
            raw,
        }
    }
}

pub struct MessageRouter {
    sessions: Arc<SessionStore>,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn DomainStore>,
    ai: Arc<dyn AiClient>,
    transport: Arc<dyn Transport>,
    delivery: DeliveryCoordinator,
    responses: ResponseBuilder,
    analytics: InteractionLog,
}

impl MessageRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionStore>,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn DomainStore>,
        ai: Arc<dyn AiClient>,
        transport: Arc<dyn Transport>,
        delivery: DeliveryCoordinator,
        responses: ResponseBuilder,
        analytics: InteractionLog,
    ) -> Self {
        Self {
            sessions,
            limiter,
            store,
            ai,
            transport,
            delivery,
            responses,
            analytics,
        }
    }

    /// 处理一条入站事件（webhook 每条消息调用一次，可跨用户并发）
    pub async fn handle_event(&self, ctx: MessageContext) {
        if self.limiter.should_suppress(&ctx.user, &ctx.text) {
            tracing::info!(user = %mask_sensitive(&ctx.user), "suppressed by rate limiter");
            return;
        }
        let _guard = self.limiter.begin_processing(&ctx.user);

        if let Err(e) = self.transport.mark_read(&ctx.message_id).await {
            tracing::warn!(error = %e, "failed to mark message read");
        }

        let responses = match self.route(&ctx).await {
            Ok(responses) => responses,
            Err(e) => {
                tracing::error!(
                    user = %mask_sensitive(&ctx.user),
                    error = %e,
                    "routing failed"
                );
                vec![self.responses.error_message()]
            }
        };

        self.delivery.deliver(&ctx.user, &responses).await;

        let record = InteractionRecord::new(
            &format!("{}-whatsapp", ctx.message_type),
            &ctx.text,
            &responses.join(" | "),
            &ctx.user,
        );
        if let Err(e) = self.analytics.append(&record).await {
            tracing::warn!(error = %e, "failed to persist interaction");
        }
    }

    async fn route(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        if ctx.message_type == "image" {
            return self.handle_image(ctx).await;
        }

        if ctx.text.starts_with("memoria:") || ctx.text.starts_with("agregar:") {
            return self.handle_memory_command(ctx).await;
        }

        match self.sessions.get(&ctx.user).await {
            Some(state) => self.handle_stateful(ctx, state).await,
            None => self.handle_stateless(ctx).await,
        }
    }

    async fn handle_stateful(&self, ctx: &MessageContext, state: UserState) -> Result<Vec<String>> {
        match state {
            UserState::AwaitingPartSearch => self.run_part_search(ctx).await,
            UserState::AwaitingStatusSearch => self.run_status_search(ctx).await,
            UserState::AwaitingOrderNumber => self.run_order_search(ctx).await,
            UserState::PostConsultation | UserState::PostStatus | UserState::PostOrder => {
                self.handle_post_action(ctx, state).await
            }
            // get() 不返回 Idle；遇到则按无状态处理
            UserState::Idle => self.handle_stateless(ctx).await,
        }
    }

    async fn handle_stateless(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        match ctx.text.as_str() {
            "hola" | "ayuda" | "empezar" | "menu" | "sí" | "si" | "no" => {
                self.show_main_menu(ctx).await
            }
            "consulta" | "menubtn1" => self.start_part_flow(ctx).await,
            "estatus" | "menubtn2" => self.start_status_flow(ctx).await,
            "ordenes" | "órdenes" | "menubtn3" => self.start_order_flow(ctx).await,
            _ => self.handle_free_text(ctx).await,
        }
    }

    async fn show_main_menu(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        self.sessions.clear(&ctx.user).await;
        Ok(vec![self.responses.main_menu()])
    }

    async fn start_part_flow(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        self.sessions
            .set(&ctx.user, UserState::AwaitingPartSearch, None)
            .await;
        Ok(vec![self.responses.part_prompt()])
    }

    async fn start_status_flow(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        self.sessions
            .set(&ctx.user, UserState::AwaitingStatusSearch, None)
            .await;
        Ok(vec![self.responses.status_prompt()])
    }

    async fn start_order_flow(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        self.sessions
            .set(&ctx.user, UserState::AwaitingOrderNumber, None)
            .await;
        Ok(vec![self.responses.order_prompt()])
    }

    /// AwaitingPartSearch：任何文本当成搜索词
    async fn run_part_search(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        let parts = self
            .store
            .search_parts(&ctx.text, 10)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "part search failed, degrading to empty");
                Vec::new()
            });

        if parts.is_empty() {
            // 没有命中：知识库可能仍有相关信息；状态保持 Awaiting 让用户重试
            let fallback = match self
                .ai
                .search_with_context(&format!("pieza {}", ctx.text))
                .await
            {
                Ok(Some(context)) => self.responses.part_not_found_with_context(&context),
                _ => "⚠️ No se encontraron piezas con ese nombre o código.".to_string(),
            };
            return Ok(vec![fallback]);
        }

        let mut messages = self.responses.parts_response(&parts);
        messages.push(
            self.responses
                .yes_no_question("¿Consultar otra pieza?", "postconsulta"),
        );
        self.sessions
            .set(&ctx.user, UserState::PostConsultation, None)
            .await;
        Ok(messages)
    }

    /// AwaitingStatusSearch：任何文本当成搜索词
    async fn run_status_search(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        let records = self
            .store
            .search_parts_for_status(&ctx.text, 10)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "status search failed, degrading to empty");
                Vec::new()
            });

        if records.is_empty() {
            return Ok(vec![
                "⚠️ No se encontró esa pieza para consultar estatus.".to_string(),
            ]);
        }

        let mut messages = self.responses.status_response(&records);
        messages.push(
            self.responses
                .yes_no_question("¿Consultar otra pieza?", "poststatus"),
        );
        self.sessions
            .set(&ctx.user, UserState::PostStatus, None)
            .await;
        Ok(messages)
    }

    /// AwaitingOrderNumber：非数字拒绝并保持状态等待重试
    async fn run_order_search(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        if !validate_order_number(&ctx.text) {
            return Ok(vec![self.responses.order_must_be_numeric()]);
        }
        let doc_num: i64 = ctx.text.trim().parse().unwrap_or(0);

        let order = match self.store.get_order(doc_num).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "order lookup failed, degrading to not found");
                None
            }
        };

        let Some(order) = order else {
            return Ok(vec![self.responses.order_not_found()]);
        };

        let mut messages = self.responses.order_response(&order);
        messages.push(
            self.responses
                .yes_no_question("¿Consultar otra orden?", "postorden"),
        );
        self.sessions
            .set(&ctx.user, UserState::PostOrder, None)
            .await;
        Ok(messages)
    }

    /// Post*：sí 重启对应流程，no 告别，其余回菜单
    async fn handle_post_action(
        &self,
        ctx: &MessageContext,
        state: UserState,
    ) -> Result<Vec<String>> {
        match ctx.text.as_str() {
            "sí" | "si" => match state {
                UserState::PostConsultation => self.start_part_flow(ctx).await,
                UserState::PostStatus => self.start_status_flow(ctx).await,
                _ => self.start_order_flow(ctx).await,
            },
            "no" => {
                self.sessions.clear(&ctx.user).await;
                Ok(vec![self.responses.farewell()])
            }
            _ => self.show_main_menu(ctx).await,
        }
    }

    /// 自由文本策略链
    async fn handle_free_text(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        if let Some(messages) = self.try_automatic_query(ctx).await {
            return Ok(messages);
        }
        if let Some(messages) = self.try_direct_part_search(ctx).await {
            return Ok(messages);
        }
        if let Some(messages) = self.try_client_orders(ctx).await {
            return Ok(messages);
        }
        if let Some(messages) = self.try_ai(ctx).await {
            return Ok(messages);
        }
        Ok(vec![self.responses.help_message()])
    }

    /// 策略 1：结构化意图 → 领域查询，结果再让 AI 补充信息
    async fn try_automatic_query(&self, ctx: &MessageContext) -> Option<Vec<String>> {
        let intent = intent::detect(&ctx.text)?;
        tracing::info!(?intent, "automatic query detected");

        let db_text = match intent {
            Intent::Part(term) => match self.store.search_parts(&term, 10).await {
                Ok(parts) if parts.is_empty() => {
                    format!("❌ No encontré ninguna pieza con '{}' en el sistema.", term)
                }
                Ok(parts) => self.responses.parts_response(&parts).join("\n\n"),
                Err(e) => {
                    tracing::warn!(error = %e, "automatic part query failed");
                    format!("⚠️ Error consultando '{}'. Intenta con el menú principal.", term)
                }
            },
            Intent::Order(number) => {
                let Ok(doc_num) = number.parse::<i64>() else {
                    return Some(vec![format!(
                        "⚠️ '{}' no es un número de orden válido.",
                        number
                    )]);
                };
                match self.store.get_order(doc_num).await {
                    Ok(Some(order)) => self.responses.order_response(&order).join("\n\n"),
                    Ok(None) => {
                        format!("❌ No encontré la orden número {} en el sistema.", number)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "automatic order query failed");
                        format!("⚠️ Error consultando orden {}.", number)
                    }
                }
            }
            Intent::Status(term) => match self.store.search_parts_for_status(&term, 10).await {
                Ok(records) if records.is_empty() => format!(
                    "❌ No encontré ninguna pieza '{}' para consultar estatus.",
                    term
                ),
                Ok(records) if records.len() == 1 => {
                    self.responses.status_response(&records).join("\n\n")
                }
                Ok(records) => format!(
                    "🔍 Encontré {} piezas con '{}'. Especifica más para ver el estatus.",
                    records.len(),
                    term
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "automatic status query failed");
                    format!("⚠️ Error consultando estatus de '{}'.", term)
                }
            },
        };

        // BD 结果之上让 AI 补充；AI 失败则只回 BD 结果
        let extra = self
            .ai
            .ask_with_context(
                &ctx.text,
                &format!("Base de datos encontró: {}. Proporciona información adicional útil sobre SAP.", db_text),
            )
            .await
            .ok();
        Some(vec![self
            .responses
            .ai_enriched_response(&db_text, extra.as_deref())])
    }

    /// 策略 2：整句直接做 pieza 模糊搜索
    async fn try_direct_part_search(&self, ctx: &MessageContext) -> Option<Vec<String>> {
        match self.store.search_parts(&ctx.text, 10).await {
            Ok(parts) if !parts.is_empty() => Some(self.responses.parts_response(&parts)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "direct part search failed");
                None
            }
        }
    }

    /// 策略 3：像名称的文本按 cliente 搜索 órdenes
    async fn try_client_orders(&self, ctx: &MessageContext) -> Option<Vec<String>> {
        if !looks_like_name(&ctx.text) {
            return None;
        }
        match self.store.search_orders_by_client(&ctx.text, 5).await {
            Ok(orders) if !orders.is_empty() => {
                Some(self.responses.orders_by_client_response(&ctx.text, &orders))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "client order search failed");
                None
            }
        }
    }

    /// 策略 4：AI（先试知识库增强，再裸问答）
    async fn try_ai(&self, ctx: &MessageContext) -> Option<Vec<String>> {
        match self.ai.search_with_context(&ctx.text).await {
            Ok(Some(answer)) => return Some(vec![self.responses.ai_response(&answer)]),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "knowledge search failed");
            }
        }
        match self.ai.ask(&ctx.text).await {
            Ok(answer) => Some(vec![self.responses.ai_response(&answer)]),
            Err(e) => {
                tracing::warn!(error = %e, "ai ask failed, falling through to help");
                None
            }
        }
    }

    /// 图像分支：media id → URL → AI 描述；AI 不可用时退回文字提示
    async fn handle_image(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        if !self.ai.is_available() {
            return Ok(vec![self.responses.image_unavailable()]);
        }

        let Some(media_id) = ctx.raw.pointer("/image/id").and_then(Value::as_str) else {
            return Ok(vec![self.responses.image_failed()]);
        };

        let reference = match self.transport.media_url(media_id).await {
            Ok(Some(url)) => url,
            _ => media_id.to_string(),
        };

        match self.ai.analyze_image(&reference).await {
            Ok(analysis) => Ok(vec![self.responses.image_analysis(&analysis)]),
            Err(e) => {
                tracing::warn!(error = %e, "image analysis failed");
                Ok(vec![self.responses.image_failed()])
            }
        }
    }

    /// "memoria:" / "agregar:" 指令：内容可带 " | fuente" 后缀
    async fn handle_memory_command(&self, ctx: &MessageContext) -> Result<Vec<String>> {
        let content = ctx
            .text
            .split_once(':')
            .map(|(_, rest)| rest.trim())
            .unwrap_or_default();

        let (text, source) = match content.split_once(" | ") {
            Some((text, source)) => (text.trim().to_string(), source.trim().to_string()),
            None => (
                content.to_string(),
                format!("WhatsApp ({})", ctx.display_name),
            ),
        };

        if text.is_empty() {
            return Ok(vec![self.responses.memory_failed()]);
        }

        match self.ai.save_to_memory(&text, &source).await {
            Ok(()) => Ok(vec![self.responses.memory_saved(&text, &source)]),
            Err(e) => {
                tracing::warn!(error = %e, "failed to save knowledge");
                Ok(vec![self.responses.memory_failed()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiClient;
    use crate::domain::{MemoryStore, OrderInfo};
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_text(&self, _to: &str, body: &str) -> Result<()> {
            self.sent.lock().unwrap().push(body.to_string());
            Ok(())
        }

        async fn send_interactive(&self, _to: &str, payload: &str) -> Result<()> {
            self.sent.lock().unwrap().push(payload.to_string());
            Ok(())
        }

        async fn mark_read(&self, _message_id: &str) -> Result<()> {
            Ok(())
        }

        async fn media_url(&self, _media_id: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct Harness {
        router: MessageRouter,
        sessions: Arc<SessionStore>,
        limiter: Arc<RateLimiter>,
        transport: Arc<RecordingTransport>,
        ai: Arc<MockAiClient>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(store: MemoryStore, ai: MockAiClient) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(300)));
        // 冷却窗口设为 0，单元测试里连续事件不受限流影响
        let limiter = Arc::new(RateLimiter::new(
            Duration::ZERO,
            Duration::from_secs(600),
            100,
        ));
        let transport = Arc::new(RecordingTransport::new());
        let ai = Arc::new(ai);
        let transport_dyn: Arc<dyn Transport> = transport.clone();
        let router = MessageRouter::new(
            Arc::clone(&sessions),
            Arc::clone(&limiter),
            Arc::new(store),
            ai.clone(),
            transport_dyn.clone(),
            DeliveryCoordinator::new(transport_dyn, Duration::from_millis(1)),
            ResponseBuilder::new("AVANS"),
            InteractionLog::new(dir.path().join("interacciones.jsonl")),
        );
        Harness {
            router,
            sessions,
            limiter,
            transport,
            ai,
            _dir: dir,
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_part(
            "tornillo hexagonal",
            "TRN-100",
            vec![("BOD-NORTE", 15)],
            Some(("en producción", "2024-05-01")),
        );
        store.add_order(OrderInfo {
            doc_num: 4521,
            customer: "Constructora Maya".to_string(),
            paid: "80%".to_string(),
            invoiced: "100%".to_string(),
            delivered: "50%".to_string(),
        });
        store
    }

    fn text_event(user: &str, text: &str) -> MessageContext {
        MessageContext::from_raw(
            serde_json::json!({"type": "text", "text": {"body": text}}),
            user,
            "wamid.test",
            "Usuario Prueba",
        )
    }

    #[tokio::test]
    async fn test_greeting_shows_menu_and_clears_state() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        h.sessions
            .set("u1", UserState::PostConsultation, None)
            .await;

        h.router.handle_event(text_event("u1", "hola")).await;

        assert_eq!(h.sessions.get("u1").await, None);
        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with('{'));
        assert!(sent[0].contains("menubtn1"));
    }

    #[tokio::test]
    async fn test_consulta_enters_awaiting_part_search() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        h.router.handle_event(text_event("u1", "consulta")).await;

        assert_eq!(
            h.sessions.get("u1").await,
            Some(UserState::AwaitingPartSearch)
        );
        assert!(h.transport.sent()[0].contains("nombre o código"));
    }

    #[tokio::test]
    async fn test_part_search_transitions_to_post_consultation() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        h.router.handle_event(text_event("u1", "consulta")).await;
        h.router.handle_event(text_event("u1", "tornillo")).await;

        assert_eq!(
            h.sessions.get("u1").await,
            Some(UserState::PostConsultation)
        );
        let sent = h.transport.sent();
        // prompt + detalle + pregunta sí/no
        assert_eq!(sent.len(), 3);
        assert!(sent[1].contains("TRN-100"));
        assert!(sent[2].contains("postconsulta_yes"));
    }

    #[tokio::test]
    async fn test_post_yes_restarts_matching_flow() {
        let cases = [
            (UserState::PostConsultation, UserState::AwaitingPartSearch),
            (UserState::PostStatus, UserState::AwaitingStatusSearch),
            (UserState::PostOrder, UserState::AwaitingOrderNumber),
        ];
        for (post, awaiting) in cases {
            let h = harness_with(seeded_store(), MockAiClient::new());
            h.sessions.set("u1", post, None).await;
            h.router.handle_event(text_event("u1", "sí")).await;
            assert_eq!(h.sessions.get("u1").await, Some(awaiting));
        }
    }

    #[tokio::test]
    async fn test_post_no_clears_session_with_farewell() {
        for post in [
            UserState::PostConsultation,
            UserState::PostStatus,
            UserState::PostOrder,
        ] {
            let h = harness_with(seeded_store(), MockAiClient::new());
            h.sessions.set("u1", post, None).await;
            h.router.handle_event(text_event("u1", "no")).await;

            assert_eq!(h.sessions.get("u1").await, None);
            assert_eq!(h.sessions.get_data("u1", "x").await, None);
            assert!(h.transport.sent()[0].contains("Gracias por usar AVANS"));
        }
    }

    #[tokio::test]
    async fn test_non_numeric_order_rejected_and_state_kept() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        h.router.handle_event(text_event("u1", "ordenes")).await;
        h.router.handle_event(text_event("u1", "orden abc")).await;

        assert_eq!(
            h.sessions.get("u1").await,
            Some(UserState::AwaitingOrderNumber)
        );
        let sent = h.transport.sent();
        assert!(sent[1].contains("debe ser numérico"));
    }

    #[tokio::test]
    async fn test_order_lookup_happy_path() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        h.router.handle_event(text_event("u1", "ordenes")).await;
        h.router.handle_event(text_event("u1", "4521")).await;

        assert_eq!(h.sessions.get("u1").await, Some(UserState::PostOrder));
        let sent = h.transport.sent();
        assert!(sent[1].contains("Constructora Maya"));
        assert!(sent[2].contains("postorden_yes"));
    }

    #[tokio::test]
    async fn test_in_flight_marker_drops_second_event() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        let _guard = h.limiter.begin_processing("u1");

        h.router.handle_event(text_event("u1", "hola")).await;
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_free_text_automatic_query() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        h.router
            .handle_event(text_event("u1", "código trn-100"))
            .await;

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("TRN-100"));
        assert!(sent[0].contains("Información adicional"));
        // la consulta automática no deja estado pendiente
        assert_eq!(h.sessions.get("u1").await, None);
    }

    #[tokio::test]
    async fn test_free_text_falls_back_to_help_without_ai() {
        let h = harness_with(MemoryStore::new(), MockAiClient::unavailable());
        h.router
            .handle_event(text_event("u1", "9#@!"))
            .await;

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Comandos disponibles"));
    }

    #[tokio::test]
    async fn test_free_text_uses_ai_when_nothing_matches() {
        let h = harness_with(MemoryStore::new(), MockAiClient::new());
        h.router
            .handle_event(text_event("u1", "118xx"))
            .await;

        let sent = h.transport.sent();
        assert!(sent[0].contains("Asistente AVANS"));
        assert!(sent[0].contains("respuesta simulada"));
    }

    #[tokio::test]
    async fn test_memory_command_saves_knowledge() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        h.router
            .handle_event(text_event(
                "u1",
                "memoria: el motor se revisa cada 500 horas | Manual",
            ))
            .await;

        let saved = h.ai.saved();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].0.contains("500 horas"));
        assert_eq!(saved[0].1, "manual");
        assert!(h.transport.sent()[0].contains("Conocimiento guardado"));
    }

    #[tokio::test]
    async fn test_image_without_ai_gives_text_fallback() {
        let h = harness_with(seeded_store(), MockAiClient::unavailable());
        let ctx = MessageContext::from_raw(
            serde_json::json!({"type": "image", "image": {"id": "MEDIA-1"}}),
            "u1",
            "wamid.img",
            "Usuario Prueba",
        );
        h.router.handle_event(ctx).await;

        assert!(h.transport.sent()[0].contains("Describe el contenido"));
    }

    #[tokio::test]
    async fn test_image_with_ai_analyzes() {
        let h = harness_with(seeded_store(), MockAiClient::new());
        let ctx = MessageContext::from_raw(
            serde_json::json!({"type": "image", "image": {"id": "MEDIA-1"}}),
            "u1",
            "wamid.img",
            "Usuario Prueba",
        );
        h.router.handle_event(ctx).await;

        let sent = h.transport.sent();
        assert!(sent[0].contains("Análisis de imagen"));
        assert!(sent[0].contains("MEDIA-1"));
    }
}
