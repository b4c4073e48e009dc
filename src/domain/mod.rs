//! 领域数据访问
//!
//! 定义统一的查询接口，支持 SQLite 和内存两种实现

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::Result;

/// pieza 基础记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// 按仓库的可用量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub warehouse: String,
    pub quantity: i64,
}

/// pieza + 各仓库可用量
#[derive(Debug, Clone)]
pub struct PartDetail {
    pub record: PartRecord,
    pub availability: Vec<Availability>,
}

/// pieza 的流程 estatus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartStatus {
    /// 最近阶段
    pub stage: String,
    /// 最近更新时间（数据库原样文本）
    pub updated: String,
}

/// pieza + estatus
#[derive(Debug, Clone)]
pub struct PartStatusDetail {
    pub record: PartRecord,
    pub status: Option<PartStatus>,
}

/// orden 信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInfo {
    pub doc_num: i64,
    pub customer: String,
    pub paid: String,
    pub invoiced: String,
    pub delivered: String,
}

/// 库存 / 订单总量统计（/stats 与诊断用）
#[derive(Debug, Clone, Default)]
pub struct DomainStats {
    pub total_parts: u64,
    pub total_orders: u64,
    pub total_warehouses: u64,
    pub total_stock: i64,
}

/// 领域查询接口
///
/// 所有方法出错时由调用方降级（"no encontrado" 或 AI fallback），
/// 错误不会到达用户。
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// 按名称 / código 模糊搜索 piezas，附各仓库可用量
    async fn search_parts(&self, term: &str, limit: usize) -> Result<Vec<PartDetail>>;

    /// 按名称 / código 模糊搜索 piezas，附 estatus
    async fn search_parts_for_status(&self, term: &str, limit: usize)
        -> Result<Vec<PartStatusDetail>>;

    /// 按 número exacto 查询 orden
    async fn get_order(&self, doc_num: i64) -> Result<Option<OrderInfo>>;

    /// 按 nombre de cliente 模糊搜索 órdenes
    async fn search_orders_by_client(&self, client: &str, limit: usize) -> Result<Vec<OrderInfo>>;

    /// 低库存清单（诊断用）
    async fn low_stock(&self, threshold: i64) -> Result<Vec<(PartRecord, i64)>>;

    /// 总量统计
    async fn stats(&self) -> Result<DomainStats>;

    /// 连通性检查
    async fn ping(&self) -> Result<()>;
}
