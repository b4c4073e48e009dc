//! SQLite 领域存储
//!
//! 三张表：articulos（pieza 目录 + etapa）、existencias（按仓库的数量）、
//! ordenes（pago / facturación / entrega 百分比）。rusqlite 是同步库，
//! 每次查询经 spawn_blocking 执行，连接由 std Mutex 串行化。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    Availability, DomainStats, DomainStore, OrderInfo, PartDetail, PartRecord, PartStatus,
    PartStatusDetail,
};
use crate::error::{BotError, Result};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开（或创建）数据库并确保 schema 存在
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS articulos (
                id INTEGER PRIMARY KEY,
                nombre TEXT NOT NULL,
                codigo TEXT NOT NULL,
                etapa TEXT,
                actualizado TEXT
            );
            CREATE TABLE IF NOT EXISTS existencias (
                articulo_id INTEGER NOT NULL REFERENCES articulos(id),
                bodega TEXT NOT NULL,
                cantidad INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ordenes (
                doc_num INTEGER PRIMARY KEY,
                cliente TEXT NOT NULL,
                pagado TEXT NOT NULL,
                facturado TEXT NOT NULL,
                entregado TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// 插入一条 pieza（诊断与测试的种子数据）
    pub fn insert_part(
        &self,
        name: &str,
        code: &str,
        stage: Option<&str>,
        updated: Option<&str>,
        stock: &[(&str, i64)],
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO articulos (nombre, codigo, etapa, actualizado) VALUES (?1, ?2, ?3, ?4)",
            params![name, code, stage, updated],
        )?;
        let id = conn.last_insert_rowid();
        for (warehouse, quantity) in stock {
            conn.execute(
                "INSERT INTO existencias (articulo_id, bodega, cantidad) VALUES (?1, ?2, ?3)",
                params![id, warehouse, quantity],
            )?;
        }
        Ok(id)
    }

    /// 插入一条 orden
    pub fn insert_order(&self, order: &OrderInfo) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO ordenes (doc_num, cliente, pagado, facturado, entregado)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                order.doc_num,
                order.customer,
                order.paid,
                order.invoiced,
                order.delivered
            ],
        )?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> std::result::Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            f(&conn)
        })
        .await
        .map_err(|e| BotError::Internal(format!("blocking task join error: {}", e)))?
        .map_err(BotError::from)
    }
}

fn find_parts(conn: &Connection, term: &str, limit: usize)
    -> std::result::Result<Vec<PartRecord>, rusqlite::Error>
{
    let pattern = format!("%{}%", term);
    let mut stmt = conn.prepare(
        "SELECT id, nombre, codigo FROM articulos
         WHERE nombre LIKE ?1 OR codigo LIKE ?1
         ORDER BY nombre LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![pattern, limit as i64], |row| {
        Ok(PartRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn availability_for(conn: &Connection, part_id: i64)
    -> std::result::Result<Vec<Availability>, rusqlite::Error>
{
    let mut stmt = conn.prepare(
        "SELECT bodega, cantidad FROM existencias WHERE articulo_id = ?1 ORDER BY bodega",
    )?;
    let rows = stmt.query_map(params![part_id], |row| {
        Ok(Availability {
            warehouse: row.get(0)?,
            quantity: row.get(1)?,
        })
    })?;
    rows.collect()
}

#[async_trait]
impl DomainStore for SqliteStore {
    async fn search_parts(&self, term: &str, limit: usize) -> Result<Vec<PartDetail>> {
        let term = term.to_string();
        self.with_conn(move |conn| {
            let records = find_parts(conn, &term, limit)?;
            let mut details = Vec::with_capacity(records.len());
            for record in records {
                let availability = availability_for(conn, record.id)?;
                details.push(PartDetail {
                    record,
                    availability,
                });
            }
            Ok(details)
        })
        .await
    }

    async fn search_parts_for_status(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<PartStatusDetail>> {
        let term = term.to_string();
        self.with_conn(move |conn| {
            let records = find_parts(conn, &term, limit)?;
            let mut details = Vec::with_capacity(records.len());
            for record in records {
                let status: Option<(Option<String>, Option<String>)> = conn
                    .query_row(
                        "SELECT etapa, actualizado FROM articulos WHERE id = ?1",
                        params![record.id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                let status = status.and_then(|(stage, updated)| {
                    stage.map(|stage| PartStatus {
                        stage,
                        updated: updated.unwrap_or_else(|| "N/A".to_string()),
                    })
                });
                details.push(PartStatusDetail { record, status });
            }
            Ok(details)
        })
        .await
    }

    async fn get_order(&self, doc_num: i64) -> Result<Option<OrderInfo>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT doc_num, cliente, pagado, facturado, entregado
                 FROM ordenes WHERE doc_num = ?1",
                params![doc_num],
                |row| {
                    Ok(OrderInfo {
                        doc_num: row.get(0)?,
                        customer: row.get(1)?,
                        paid: row.get(2)?,
                        invoiced: row.get(3)?,
                        delivered: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn search_orders_by_client(&self, client: &str, limit: usize) -> Result<Vec<OrderInfo>> {
        let client = client.to_string();
        self.with_conn(move |conn| {
            let pattern = format!("%{}%", client);
            let mut stmt = conn.prepare(
                "SELECT doc_num, cliente, pagado, facturado, entregado
                 FROM ordenes WHERE cliente LIKE ?1
                 ORDER BY doc_num DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit as i64], |row| {
                Ok(OrderInfo {
                    doc_num: row.get(0)?,
                    customer: row.get(1)?,
                    paid: row.get(2)?,
                    invoiced: row.get(3)?,
                    delivered: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    async fn low_stock(&self, threshold: i64) -> Result<Vec<(PartRecord, i64)>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.nombre, a.codigo, SUM(e.cantidad) AS total
                 FROM articulos a JOIN existencias e ON e.articulo_id = a.id
                 GROUP BY a.id HAVING total <= ?1 AND total >= 0
                 ORDER BY total ASC",
            )?;
            let rows = stmt.query_map(params![threshold], |row| {
                Ok((
                    PartRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        code: row.get(2)?,
                    },
                    row.get(3)?,
                ))
            })?;
            rows.collect()
        })
        .await
    }

    async fn stats(&self) -> Result<DomainStats> {
        self.with_conn(|conn| {
            let total_parts: u64 =
                conn.query_row("SELECT COUNT(*) FROM articulos", [], |r| r.get(0))?;
            let total_orders: u64 =
                conn.query_row("SELECT COUNT(*) FROM ordenes", [], |r| r.get(0))?;
            let total_warehouses: u64 = conn.query_row(
                "SELECT COUNT(DISTINCT bodega) FROM existencias",
                [],
                |r| r.get(0),
            )?;
            let total_stock: i64 = conn.query_row(
                "SELECT COALESCE(SUM(cantidad), 0) FROM existencias WHERE cantidad > 0",
                [],
                |r| r.get(0),
            )?;
            Ok(DomainStats {
                total_parts,
                total_orders,
                total_warehouses,
                total_stock,
            })
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |_| Ok(()))).await
    }
}
