//! 连通性诊断
//!
//! 依次检查：SQLite 数据库、Ollama 后端、WhatsApp Cloud API。
//! 用于部署后快速确认三个 collaborator 都可达。
//!
//! 运行: cargo run --bin avans-diag

use std::sync::Arc;

use anyhow::Context;

use avans::ai::{AiClient, OllamaClient};
use avans::config::load_config;
use avans::domain::{DomainStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    avans::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;

    // 1. Base de datos
    match SqliteStore::open(&cfg.database.path) {
        Ok(store) => {
            let store: Arc<dyn DomainStore> = Arc::new(store);
            match store.ping().await {
                Ok(()) => {
                    let stats = store.stats().await.unwrap_or_default();
                    println!(
                        "✅ Base de datos: ok ({} piezas, {} órdenes, {} bodegas)",
                        stats.total_parts, stats.total_orders, stats.total_warehouses
                    );
                    let low = store.low_stock(5).await.unwrap_or_default();
                    if !low.is_empty() {
                        println!("   ⚠️ {} piezas con stock bajo (≤5)", low.len());
                    }
                }
                Err(e) => println!("❌ Base de datos: {}", e),
            }
        }
        Err(e) => println!("❌ Base de datos: {}", e),
    }

    // 2. Ollama
    let ai = OllamaClient::new(&cfg.ai);
    if !ai.is_available() {
        println!("⚠️ AI: deshabilitada por configuración");
    } else {
        match ai.ask("Test de conectividad. Responde con una sola palabra.").await {
            Ok(respuesta) => println!(
                "✅ AI ({}): ok — {}",
                cfg.ai.model,
                respuesta.chars().take(60).collect::<String>()
            ),
            Err(e) => println!("❌ AI ({}): {}", cfg.ai.model, e),
        }
    }

    // 3. WhatsApp API
    match std::env::var("WHATSAPP_ACCESS_TOKEN") {
        Err(_) => println!("⚠️ WhatsApp: WHATSAPP_ACCESS_TOKEN no configurado"),
        Ok(token) => {
            let url = format!("{}/me", cfg.whatsapp.api_base.trim_end_matches('/'));
            match reqwest::Client::new()
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    println!("✅ WhatsApp API: ok");
                }
                Ok(response) => println!("❌ WhatsApp API: status {}", response.status()),
                Err(e) => println!("❌ WhatsApp API: {}", e),
            }
        }
    }

    Ok(())
}
