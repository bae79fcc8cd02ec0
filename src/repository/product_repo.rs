// ==========================================
// 供应商价目表管理系统 - 商品数据仓储
// ==========================================
// 职责: supplier_product / main_product / main_product_log 的数据访问
// 红线: Repository 不含业务规则，只做数据 CRUD
// 写入: 批量写入一律在调用方提供的事务内完成（*_tx）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::product::{MainProduct, MainProductLog, SupplierProduct};
use crate::domain::types::MainPriceField;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{self, datetime_to_sql, decimal_to_sql, opt_datetime_to_sql};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// IN 查询单批最大参数个数（低于 SQLite 默认上限）
const IN_CHUNK_SIZE: usize = 500;

const SUPPLIER_PRODUCT_SELECT: &str = r#"
    SELECT sp.id, sp.supplier_id, sp.article, sp.name, sp.manufacturer_id, sp.stock,
           sp.supplier_price, sp.rrp, sp.discount_price, sp.main_product_id, sp.updated_at,
           (SELECT GROUP_CONCAT(g.discount_group_id)
              FROM supplier_product_discount_group g
             WHERE g.supplier_product_id = sp.id) AS discount_group_ids
    FROM supplier_product sp
"#;

const MAIN_PRODUCT_SELECT: &str = r#"
    SELECT id, supplier_id, article, name, sku, category_id, manufacturer_id, stock,
           prime_cost, wholesale_price, basic_price, m_price, wholesale_price_extra,
           price_updated_at, stock_updated_at, search_vector
    FROM main_product
"#;

fn map_supplier_product(row: &Row) -> rusqlite::Result<SupplierProduct> {
    Ok(SupplierProduct {
        id: row.get(0)?,
        supplier_id: row.get(1)?,
        article: row.get(2)?,
        name: row.get(3)?,
        manufacturer_id: row.get(4)?,
        stock: row.get(5)?,
        supplier_price: sql_types::opt_decimal(row, 6)?,
        rrp: sql_types::opt_decimal(row, 7)?,
        discount_price: sql_types::opt_decimal(row, 8)?,
        main_product_id: row.get(9)?,
        updated_at: sql_types::opt_datetime(row, 10)?,
        discount_group_ids: sql_types::id_list(row, 11)?,
    })
}

fn map_main_product(row: &Row) -> rusqlite::Result<MainProduct> {
    Ok(MainProduct {
        id: row.get(0)?,
        supplier_id: row.get(1)?,
        article: row.get(2)?,
        name: row.get(3)?,
        sku: row.get(4)?,
        category_id: row.get(5)?,
        manufacturer_id: row.get(6)?,
        stock: row.get(7)?,
        prime_cost: sql_types::opt_decimal(row, 8)?,
        wholesale_price: sql_types::opt_decimal(row, 9)?,
        basic_price: sql_types::opt_decimal(row, 10)?,
        m_price: sql_types::opt_decimal(row, 11)?,
        wholesale_price_extra: sql_types::opt_decimal(row, 12)?,
        price_updated_at: sql_types::opt_datetime(row, 13)?,
        stock_updated_at: sql_types::opt_datetime(row, 14)?,
        search_vector: row.get(15)?,
    })
}

fn map_log(row: &Row) -> rusqlite::Result<MainProductLog> {
    Ok(MainProductLog {
        created_at: sql_types::datetime(row, 0)?,
        main_product_id: row.get(1)?,
        stock: row.get(2)?,
        prime_cost: sql_types::opt_decimal(row, 3)?,
        wholesale_price: sql_types::opt_decimal(row, 4)?,
        basic_price: sql_types::opt_decimal(row, 5)?,
        m_price: sql_types::opt_decimal(row, 6)?,
        wholesale_price_extra: sql_types::opt_decimal(row, 7)?,
    })
}

// ==========================================
// ProductRepository
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在单个事务内执行批量写入；闭包返回 Err 时整体回滚
    pub fn transaction<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RepositoryResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(value)
    }

    // ==========================================
    // 供应商商品 - 查询
    // ==========================================

    pub fn find_supplier_products(&self, supplier_id: i64) -> RepositoryResult<Vec<SupplierProduct>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE sp.supplier_id = ?1 ORDER BY sp.id", SUPPLIER_PRODUCT_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![supplier_id], map_supplier_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_supplier_product(
        &self,
        supplier_id: i64,
        article: &str,
        name: &str,
    ) -> RepositoryResult<Option<SupplierProduct>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE sp.supplier_id = ?1 AND sp.article = ?2 AND sp.name = ?3",
            SUPPLIER_PRODUCT_SELECT
        );
        let product = conn
            .query_row(&sql, params![supplier_id, article, name], map_supplier_product)
            .optional()?;
        Ok(product)
    }

    pub fn count_supplier_products(&self, supplier_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM supplier_product WHERE supplier_id = ?1",
            params![supplier_id],
            |row| row.get(0),
        )?)
    }

    // ==========================================
    // 主商品 - 查询
    // ==========================================

    pub fn find_main_products(&self, supplier_id: i64) -> RepositoryResult<Vec<MainProduct>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE supplier_id = ?1 ORDER BY id", MAIN_PRODUCT_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![supplier_id], map_main_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_all_main_products(&self) -> RepositoryResult<Vec<MainProduct>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY id", MAIN_PRODUCT_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_main_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_main_product(&self, id: i64) -> RepositoryResult<Option<MainProduct>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE id = ?1", MAIN_PRODUCT_SELECT);
        let product = conn.query_row(&sql, params![id], map_main_product).optional()?;
        Ok(product)
    }

    /// 按 id 批量读取（分批 IN 查询）
    pub fn find_main_products_by_ids(&self, ids: &[i64]) -> RepositoryResult<HashMap<i64, MainProduct>> {
        let conn = self.get_conn()?;
        let mut products = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(IN_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("{} WHERE id IN ({})", MAIN_PRODUCT_SELECT, placeholders);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), map_main_product)?;
            for row in rows {
                let product = row?;
                products.insert(product.id, product);
            }
        }
        Ok(products)
    }

    /// 检索向量缺失的主商品
    pub fn find_main_products_missing_search_vector(&self) -> RepositoryResult<Vec<MainProduct>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE search_vector IS NULL OR search_vector = '' ORDER BY id",
            MAIN_PRODUCT_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_main_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 关联供应商商品的正库存合计: main_product_id → SUM(stock)
    pub fn linked_stock_totals(&self) -> RepositoryResult<HashMap<i64, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT main_product_id, SUM(CASE WHEN stock > 0 THEN stock ELSE 0 END)
            FROM supplier_product
            WHERE main_product_id IS NOT NULL
            GROUP BY main_product_id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    // ==========================================
    // 历史
    // ==========================================

    pub fn find_logs(&self, main_product_id: i64) -> RepositoryResult<Vec<MainProductLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT created_at, main_product_id, stock, prime_cost, wholesale_price,
                   basic_price, m_price, wholesale_price_extra
            FROM main_product_log WHERE main_product_id = ?1 ORDER BY created_at, id
            "#,
        )?;
        let rows = stmt
            .query_map(params![main_product_id], map_log)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_logs(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM main_product_log", [], |row| row.get(0))?)
    }

    // ==========================================
    // 事务内写入
    // ==========================================

    /// 批量保存主商品: id=0 走 upsert（冲突目标 supplier/article/name），否则按 id 更新
    ///
    /// 新插入记录的 id 回写到切片中
    pub fn save_main_products_tx(tx: &Transaction, products: &mut [MainProduct]) -> RepositoryResult<usize> {
        let mut insert = tx.prepare(
            r#"
            INSERT INTO main_product (
                supplier_id, article, name, sku, category_id, manufacturer_id, stock,
                prime_cost, wholesale_price, basic_price, m_price, wholesale_price_extra,
                price_updated_at, stock_updated_at, search_vector
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(supplier_id, article, name) DO UPDATE SET
                sku = excluded.sku,
                category_id = COALESCE(excluded.category_id, main_product.category_id),
                manufacturer_id = COALESCE(excluded.manufacturer_id, main_product.manufacturer_id),
                search_vector = excluded.search_vector
            RETURNING id
            "#,
        )?;
        let mut update = tx.prepare(
            r#"
            UPDATE main_product SET
                article = ?2, name = ?3, sku = ?4, category_id = ?5, manufacturer_id = ?6,
                stock = ?7, prime_cost = ?8, wholesale_price = ?9, basic_price = ?10,
                m_price = ?11, wholesale_price_extra = ?12, price_updated_at = ?13,
                stock_updated_at = ?14, search_vector = ?15
            WHERE id = ?1
            "#,
        )?;

        let mut count = 0;
        for p in products.iter_mut() {
            if p.id == 0 {
                p.id = insert.query_row(
                    params![
                        p.supplier_id,
                        p.article,
                        p.name,
                        p.sku,
                        p.category_id,
                        p.manufacturer_id,
                        p.stock,
                        decimal_to_sql(p.prime_cost),
                        decimal_to_sql(p.wholesale_price),
                        decimal_to_sql(p.basic_price),
                        decimal_to_sql(p.m_price),
                        decimal_to_sql(p.wholesale_price_extra),
                        opt_datetime_to_sql(p.price_updated_at),
                        opt_datetime_to_sql(p.stock_updated_at),
                        p.search_vector,
                    ],
                    |row| row.get(0),
                )?;
            } else {
                update.execute(params![
                    p.id,
                    p.article,
                    p.name,
                    p.sku,
                    p.category_id,
                    p.manufacturer_id,
                    p.stock,
                    decimal_to_sql(p.prime_cost),
                    decimal_to_sql(p.wholesale_price),
                    decimal_to_sql(p.basic_price),
                    decimal_to_sql(p.m_price),
                    decimal_to_sql(p.wholesale_price_extra),
                    opt_datetime_to_sql(p.price_updated_at),
                    opt_datetime_to_sql(p.stock_updated_at),
                    p.search_vector,
                ])?;
            }
            count += 1;
        }
        Ok(count)
    }

    /// 批量保存供应商商品及其折扣组关联
    pub fn save_supplier_products_tx(
        tx: &Transaction,
        products: &mut [SupplierProduct],
    ) -> RepositoryResult<usize> {
        let mut insert = tx.prepare(
            r#"
            INSERT INTO supplier_product (
                supplier_id, article, name, manufacturer_id, stock,
                supplier_price, rrp, discount_price, main_product_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(supplier_id, article, name) DO UPDATE SET
                manufacturer_id = excluded.manufacturer_id,
                stock = excluded.stock,
                supplier_price = excluded.supplier_price,
                rrp = excluded.rrp,
                discount_price = excluded.discount_price,
                main_product_id = COALESCE(excluded.main_product_id, supplier_product.main_product_id),
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )?;
        let mut update = tx.prepare(
            r#"
            UPDATE supplier_product SET
                article = ?2, name = ?3, manufacturer_id = ?4, stock = ?5,
                supplier_price = ?6, rrp = ?7, discount_price = ?8,
                main_product_id = ?9, updated_at = ?10
            WHERE id = ?1
            "#,
        )?;
        let mut clear_groups =
            tx.prepare("DELETE FROM supplier_product_discount_group WHERE supplier_product_id = ?1")?;
        let mut add_group = tx.prepare(
            "INSERT OR IGNORE INTO supplier_product_discount_group (supplier_product_id, discount_group_id)
             VALUES (?1, ?2)",
        )?;

        let now = Utc::now();
        let mut count = 0;
        for p in products.iter_mut() {
            let updated_at = datetime_to_sql(p.updated_at.unwrap_or(now));
            if p.id == 0 {
                p.id = insert.query_row(
                    params![
                        p.supplier_id,
                        p.article,
                        p.name,
                        p.manufacturer_id,
                        p.stock,
                        decimal_to_sql(p.supplier_price),
                        decimal_to_sql(p.rrp),
                        decimal_to_sql(p.discount_price),
                        p.main_product_id,
                        updated_at,
                    ],
                    |row| row.get(0),
                )?;
            } else {
                update.execute(params![
                    p.id,
                    p.article,
                    p.name,
                    p.manufacturer_id,
                    p.stock,
                    decimal_to_sql(p.supplier_price),
                    decimal_to_sql(p.rrp),
                    decimal_to_sql(p.discount_price),
                    p.main_product_id,
                    updated_at,
                ])?;
            }

            clear_groups.execute(params![p.id])?;
            for group_id in &p.discount_group_ids {
                add_group.execute(params![p.id, group_id])?;
            }
            count += 1;
        }
        Ok(count)
    }

    /// 写入单个价格字段并刷新 price_updated_at
    pub fn update_main_price_tx(
        tx: &Transaction,
        main_product_id: i64,
        field: MainPriceField,
        value: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        // 列名来自静态枚举，非用户输入
        let sql = format!(
            "UPDATE main_product SET {} = ?1, price_updated_at = ?2 WHERE id = ?3",
            field.column()
        );
        tx.execute(
            &sql,
            params![decimal_to_sql(value), datetime_to_sql(now), main_product_id],
        )?;
        Ok(())
    }

    pub fn update_main_stock_tx(
        tx: &Transaction,
        main_product_id: i64,
        stock: i64,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE main_product SET stock = ?1, stock_updated_at = ?2 WHERE id = ?3",
            params![stock, datetime_to_sql(now), main_product_id],
        )?;
        Ok(())
    }

    pub fn update_search_vector_tx(
        tx: &Transaction,
        main_product_id: i64,
        search_vector: &str,
    ) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE main_product SET search_vector = ?1 WHERE id = ?2",
            params![search_vector, main_product_id],
        )?;
        Ok(())
    }

    /// 追加历史快照；同一 (created_at, product) 以最后一次为准
    pub fn insert_log_tx(tx: &Transaction, log: &MainProductLog) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO main_product_log (
                created_at, main_product_id, stock, prime_cost, wholesale_price,
                basic_price, m_price, wholesale_price_extra
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(created_at, main_product_id) DO UPDATE SET
                stock = excluded.stock,
                prime_cost = excluded.prime_cost,
                wholesale_price = excluded.wholesale_price,
                basic_price = excluded.basic_price,
                m_price = excluded.m_price,
                wholesale_price_extra = excluded.wholesale_price_extra
            "#,
            params![
                datetime_to_sql(log.created_at),
                log.main_product_id,
                log.stock,
                decimal_to_sql(log.prime_cost),
                decimal_to_sql(log.wholesale_price),
                decimal_to_sql(log.basic_price),
                decimal_to_sql(log.m_price),
                decimal_to_sql(log.wholesale_price_extra),
            ],
        )?;
        Ok(())
    }
}
