//! AVANS WhatsApp bot 服务
//!
//! 入口：初始化日志、加载配置、装配组件、启动后台会话清扫与 Webhook 服务器。
//!
//! 环境变量:
//! - WHATSAPP_ACCESS_TOKEN: Meta WhatsApp API 访问令牌
//! - AVANS__WHATSAPP__PHONE_NUMBER_ID: 企业电话号码 ID（也可写在 config）
//! - AVANS__WHATSAPP__VERIFY_TOKEN: Webhook 验证令牌（默认 "avans"）
//! - AVANS__AI__ENABLED: 关闭 AI 功能（降级为静态文案）

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use avans::ai::{AiClient, OllamaClient};
use avans::analytics::InteractionLog;
use avans::config::load_config;
use avans::delivery::DeliveryCoordinator;
use avans::domain::{DomainStore, SqliteStore};
use avans::limiter::RateLimiter;
use avans::responses::ResponseBuilder;
use avans::router::MessageRouter;
use avans::server::{create_router, AppState};
use avans::session::SessionStore;
use avans::transport::{Transport, WhatsAppClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    avans::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;

    let access_token = std::env::var("WHATSAPP_ACCESS_TOKEN")
        .context("WHATSAPP_ACCESS_TOKEN must be set")?;

    let store: Arc<dyn DomainStore> = Arc::new(
        SqliteStore::open(&cfg.database.path).context("Failed to open inventory database")?,
    );
    let ai: Arc<dyn AiClient> = Arc::new(OllamaClient::new(&cfg.ai));
    let transport: Arc<dyn Transport> = Arc::new(WhatsAppClient::new(
        &cfg.whatsapp.api_base,
        &cfg.whatsapp.phone_number_id,
        &access_token,
    ));

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        cfg.session.timeout_secs,
    )));
    let limiter = Arc::new(RateLimiter::new(
        Duration::from_secs(cfg.limiter.cooldown_secs),
        Duration::from_secs(cfg.limiter.purge_age_secs),
        cfg.limiter.purge_threshold,
    ));

    let router = Arc::new(MessageRouter::new(
        Arc::clone(&sessions),
        Arc::clone(&limiter),
        Arc::clone(&store),
        Arc::clone(&ai),
        Arc::clone(&transport),
        DeliveryCoordinator::new(
            Arc::clone(&transport),
            Duration::from_millis(cfg.delivery.pacing_ms),
        ),
        ResponseBuilder::new(&cfg.app.brand),
        InteractionLog::new(&cfg.analytics.path),
    ));

    // 后台会话清扫
    let sweep_sessions = Arc::clone(&sessions);
    let sweep_interval = Duration::from_secs(cfg.session.sweep_interval_secs);
    let sweep_max_age = Duration::from_secs(cfg.session.sweep_max_age_secs);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(sweep_interval);
        loop {
            timer.tick().await;
            sweep_sessions.sweep(sweep_max_age).await;
        }
    });

    let state = Arc::new(AppState {
        router,
        sessions,
        limiter,
        store,
        ai_available: ai.is_available(),
        verify_token: cfg.whatsapp.verify_token.clone(),
    });

    let app = create_router(state);

    let addr: std::net::SocketAddr = cfg
        .app
        .bind_addr
        .parse()
        .context("Invalid bind address")?;
    tracing::info!("AVANS bot listening on http://{}", addr);
    tracing::info!("Webhook URL: http://YOUR_HOST:{}/webhook", addr.port());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
