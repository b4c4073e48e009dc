//! Webhook 服务器
//!
//! Meta 的两个端点：GET /webhook（验证 handshake）、POST /webhook（事件）。
//! 加上 /health 与 /stats。事件解析成功后立即 200 返回，实际处理在后台
//! 任务中执行（Meta 对 webhook 响应时间敏感，超时会重试造成重复投递）。

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::DomainStore;
use crate::limiter::RateLimiter;
use crate::router::{MessageContext, MessageRouter};
use crate::session::SessionStore;
use crate::util::{mask_sensitive, normalize_phone, validate_phone};

/// 服务器共享状态
pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub sessions: Arc<SessionStore>,
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<dyn DomainStore>,
    pub ai_available: bool,
    pub verify_token: String,
}

/// Webhook 验证参数
#[derive(Debug, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// WhatsApp Webhook 请求体
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: Option<String>,
    pub entry: Option<Vec<WebhookEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    pub changes: Option<Vec<WebhookChange>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub value: Option<WebhookValue>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookValue {
    pub contacts: Option<Vec<WebhookContact>>,
    /// 消息保持原始 JSON：类型繁多（text/button/interactive/media），
    /// 字段提取交给 util::extract_text 容错处理
    pub messages: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookContact {
    pub profile: Option<WebhookProfile>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookProfile {
    pub name: Option<String>,
}

/// 创建路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/webhook", get(webhook_verify).post(webhook_receive))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn index() -> &'static str {
    "✅ AVANS bot en línea"
}

/// GET /webhook - Meta 验证 Webhook
async fn webhook_verify(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookVerifyQuery>,
) -> Result<String, StatusCode> {
    if query.mode.as_deref() == Some("subscribe")
        && query.verify_token.as_deref() == Some(&state.verify_token)
    {
        Ok(query.challenge.unwrap_or_default())
    } else {
        tracing::warn!("webhook verification rejected");
        Err(StatusCode::FORBIDDEN)
    }
}

/// POST /webhook - 接收 WhatsApp 事件
async fn webhook_receive(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    if payload.object.as_deref() != Some("whatsapp_business_account") {
        return StatusCode::OK;
    }

    let contexts = extract_contexts(payload);
    if contexts.is_empty() {
        // sin mensajes: evento de status de entrega, se ignora
        return StatusCode::OK;
    }

    for ctx in contexts {
        tracing::info!(
            user = %mask_sensitive(&ctx.user),
            message_type = %ctx.message_type,
            "inbound message"
        );
        let router = Arc::clone(&state.router);
        tokio::spawn(async move {
            router.handle_event(ctx).await;
        });
    }

    StatusCode::OK
}

/// 从 webhook 载荷提取消息上下文（容错：缺字段的消息跳过）
fn extract_contexts(payload: WebhookPayload) -> Vec<MessageContext> {
    let mut contexts = Vec::new();

    for entry in payload.entry.unwrap_or_default() {
        for change in entry.changes.unwrap_or_default() {
            let Some(value) = change.value else { continue };
            let Some(messages) = value.messages else { continue };

            let display_name = value
                .contacts
                .as_ref()
                .and_then(|contacts| contacts.first())
                .and_then(|contact| contact.profile.as_ref())
                .and_then(|profile| profile.name.clone())
                .unwrap_or_else(|| "Usuario".to_string());

            for raw in messages {
                let Some(from) = raw.get("from").and_then(Value::as_str) else {
                    continue;
                };
                let user = normalize_phone(from);
                if !validate_phone(&user) {
                    tracing::warn!(user = %mask_sensitive(from), "invalid phone number");
                }
                let message_id = raw
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                contexts.push(MessageContext::from_raw(
                    raw,
                    &user,
                    &message_id,
                    &display_name,
                ));
            }
        }
    }

    contexts
}

/// GET /health - 组件健康状态
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let database = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            "error"
        }
    };
    let ai = if state.ai_available { "ok" } else { "disabled" };

    let status = if database == "error" { "degraded" } else { "healthy" };
    let code = if database == "error" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        code,
        Json(json!({
            "status": status,
            "components": {
                "database": database,
                "ai": ai,
            }
        })),
    )
}

/// GET /stats - 会话与库存概览
async fn stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let active_sessions = state.sessions.active_count().await;
    let domain = state.store.stats().await.unwrap_or_default();

    Json(json!({
        "active_sessions": active_sessions,
        "cooldown_entries": state.limiter.cooldown_entries(),
        "total_parts": domain.total_parts,
        "total_orders": domain.total_orders,
    }))
}
