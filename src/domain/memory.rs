//! 内存领域存储（测试与离线开发用，无需数据库文件）

use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    Availability, DomainStats, DomainStore, OrderInfo, PartDetail, PartRecord, PartStatus,
    PartStatusDetail,
};
use crate::error::Result;

#[derive(Default)]
pub struct MemoryStore {
    parts: Mutex<Vec<StoredPart>>,
    orders: Mutex<Vec<OrderInfo>>,
}

struct StoredPart {
    record: PartRecord,
    availability: Vec<Availability>,
    status: Option<PartStatus>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_part(
        &self,
        name: &str,
        code: &str,
        availability: Vec<(&str, i64)>,
        status: Option<(&str, &str)>,
    ) {
        let mut parts = self.parts.lock().unwrap();
        let id = parts.len() as i64 + 1;
        parts.push(StoredPart {
            record: PartRecord {
                id,
                name: name.to_string(),
                code: code.to_string(),
            },
            availability: availability
                .into_iter()
                .map(|(warehouse, quantity)| Availability {
                    warehouse: warehouse.to_string(),
                    quantity,
                })
                .collect(),
            status: status.map(|(stage, updated)| PartStatus {
                stage: stage.to_string(),
                updated: updated.to_string(),
            }),
        });
    }

    pub fn add_order(&self, order: OrderInfo) {
        self.orders.lock().unwrap().push(order);
    }

    fn matches(record: &PartRecord, term: &str) -> bool {
        let term = term.to_lowercase();
        record.name.to_lowercase().contains(&term) || record.code.to_lowercase().contains(&term)
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn search_parts(&self, term: &str, limit: usize) -> Result<Vec<PartDetail>> {
        let parts = self.parts.lock().unwrap();
        Ok(parts
            .iter()
            .filter(|p| Self::matches(&p.record, term))
            .take(limit)
            .map(|p| PartDetail {
                record: p.record.clone(),
                availability: p.availability.clone(),
            })
            .collect())
    }

    async fn search_parts_for_status(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<PartStatusDetail>> {
        let parts = self.parts.lock().unwrap();
        Ok(parts
            .iter()
            .filter(|p| Self::matches(&p.record, term))
            .take(limit)
            .map(|p| PartStatusDetail {
                record: p.record.clone(),
                status: p.status.clone(),
            })
            .collect())
    }

    async fn get_order(&self, doc_num: i64) -> Result<Option<OrderInfo>> {
        let orders = self.orders.lock().unwrap();
        Ok(orders.iter().find(|o| o.doc_num == doc_num).cloned())
    }

    async fn search_orders_by_client(&self, client: &str, limit: usize) -> Result<Vec<OrderInfo>> {
        let client = client.to_lowercase();
        let orders = self.orders.lock().unwrap();
        Ok(orders
            .iter()
            .filter(|o| o.customer.to_lowercase().contains(&client))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn low_stock(&self, threshold: i64) -> Result<Vec<(PartRecord, i64)>> {
        let parts = self.parts.lock().unwrap();
        let mut low: Vec<(PartRecord, i64)> = parts
            .iter()
            .map(|p| {
                let total: i64 = p.availability.iter().map(|a| a.quantity).sum();
                (p.record.clone(), total)
            })
            .filter(|(_, total)| (0..=threshold).contains(total))
            .collect();
        low.sort_by_key(|(_, total)| *total);
        Ok(low)
    }

    async fn stats(&self) -> Result<DomainStats> {
        let parts = self.parts.lock().unwrap();
        let orders = self.orders.lock().unwrap();
        let mut warehouses: Vec<&str> = parts
            .iter()
            .flat_map(|p| p.availability.iter().map(|a| a.warehouse.as_str()))
            .collect();
        warehouses.sort_unstable();
        warehouses.dedup();
        Ok(DomainStats {
            total_parts: parts.len() as u64,
            total_orders: orders.len() as u64,
            total_warehouses: warehouses.len() as u64,
            total_stock: parts
                .iter()
                .flat_map(|p| p.availability.iter())
                .filter(|a| a.quantity > 0)
                .map(|a| a.quantity)
                .sum(),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
