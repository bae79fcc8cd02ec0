// ==========================================
// 供应商价目表管理系统 - 加价规则仓储
// ==========================================
// 职责: price_manager（含折扣组/品类关联表）与 price_tag 的数据访问
// 红线: 冲突判定、价格计算在 engine 层，仓储只负责持久化
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::price_manager::{PriceManager, PriceTag};
use crate::domain::types::{MainPriceField, PriceSource};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{self, date_to_sql, datetime_to_sql, decimal_to_sql};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

const PRICE_MANAGER_SELECT: &str = r#"
    SELECT pm.id, pm.name, pm.supplier_id, pm.has_rrp, pm.price_from, pm.price_to,
           pm.date_from, pm.date_to, pm.source, pm.fixed_price, pm.dest, pm.markup,
           pm.increase, pm.deprecated, pm.created_at, pm.updated_at,
           (SELECT GROUP_CONCAT(d.discount_group_id) FROM price_manager_discount_group d
             WHERE d.price_manager_id = pm.id) AS discount_group_ids,
           (SELECT GROUP_CONCAT(c.category_id) FROM price_manager_category c
             WHERE c.price_manager_id = pm.id) AS category_ids
    FROM price_manager pm
"#;

fn invalid_text(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("无法识别的价格字段: {}", value).into(),
    )
}

fn read_source(row: &Row, idx: usize) -> rusqlite::Result<PriceSource> {
    let raw: String = row.get(idx)?;
    PriceSource::from_db_str(&raw).ok_or_else(|| invalid_text(idx, &raw))
}

fn read_dest(row: &Row, idx: usize) -> rusqlite::Result<MainPriceField> {
    let raw: String = row.get(idx)?;
    MainPriceField::from_column(&raw).ok_or_else(|| invalid_text(idx, &raw))
}

fn map_price_manager(row: &Row) -> rusqlite::Result<PriceManager> {
    Ok(PriceManager {
        id: row.get(0)?,
        name: row.get(1)?,
        supplier_id: row.get(2)?,
        has_rrp: row.get(3)?,
        price_from: sql_types::opt_decimal(row, 4)?,
        price_to: sql_types::opt_decimal(row, 5)?,
        date_from: sql_types::opt_date(row, 6)?,
        date_to: sql_types::opt_date(row, 7)?,
        source: read_source(row, 8)?,
        fixed_price: sql_types::opt_decimal(row, 9)?,
        dest: read_dest(row, 10)?,
        markup: sql_types::decimal(row, 11)?,
        increase: sql_types::decimal(row, 12)?,
        deprecated: row.get(13)?,
        created_at: sql_types::datetime(row, 14)?,
        updated_at: sql_types::datetime(row, 15)?,
        discount_group_ids: sql_types::id_list(row, 16)?,
        category_ids: sql_types::id_list(row, 17)?,
    })
}

fn map_price_tag(row: &Row) -> rusqlite::Result<PriceTag> {
    Ok(PriceTag {
        main_product_id: row.get(0)?,
        price_manager_id: row.get(1)?,
        dest: read_dest(row, 2)?,
        source: read_source(row, 3)?,
        markup: sql_types::decimal(row, 4)?,
        increase: sql_types::decimal(row, 5)?,
        fixed_price: sql_types::opt_decimal(row, 6)?,
        price: sql_types::decimal(row, 7)?,
        updated_at: sql_types::datetime(row, 8)?,
    })
}

fn replace_links_tx(tx: &Transaction, rule: &PriceManager) -> RepositoryResult<()> {
    tx.execute(
        "DELETE FROM price_manager_discount_group WHERE price_manager_id = ?1",
        params![rule.id],
    )?;
    tx.execute(
        "DELETE FROM price_manager_category WHERE price_manager_id = ?1",
        params![rule.id],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO price_manager_discount_group (price_manager_id, discount_group_id)
             VALUES (?1, ?2)",
        )?;
        for group_id in &rule.discount_group_ids {
            stmt.execute(params![rule.id, group_id])?;
        }
    }
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO price_manager_category (price_manager_id, category_id) VALUES (?1, ?2)",
    )?;
    for category_id in &rule.category_ids {
        stmt.execute(params![rule.id, category_id])?;
    }
    Ok(())
}

// ==========================================
// PriceManagerRepository
// ==========================================
pub struct PriceManagerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PriceManagerRepository {
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
    // 规则 CRUD
    // ==========================================

    /// 新建规则；返回带 id 的副本
    pub fn create(&self, rule: &PriceManager) -> RepositoryResult<PriceManager> {
        self.transaction(|tx| {
            tx.execute(
                r#"
                INSERT INTO price_manager (
                    name, supplier_id, has_rrp, price_from, price_to, date_from, date_to,
                    source, fixed_price, dest, markup, increase, deprecated, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                "#,
                params![
                    rule.name,
                    rule.supplier_id,
                    rule.has_rrp,
                    decimal_to_sql(rule.price_from),
                    decimal_to_sql(rule.price_to),
                    date_to_sql(rule.date_from),
                    date_to_sql(rule.date_to),
                    rule.source.to_db_str(),
                    decimal_to_sql(rule.fixed_price),
                    rule.dest.column(),
                    decimal_to_sql(Some(rule.markup)),
                    decimal_to_sql(Some(rule.increase)),
                    rule.deprecated,
                    datetime_to_sql(rule.created_at),
                    datetime_to_sql(rule.updated_at),
                ],
            )?;
            let mut saved = rule.clone();
            saved.id = tx.last_insert_rowid();
            replace_links_tx(tx, &saved)?;
            Ok(saved)
        })
    }

    /// 整体覆盖规则字段与关联（created_at 保持不变）
    pub fn update(&self, rule: &PriceManager) -> RepositoryResult<()> {
        self.transaction(|tx| {
            let affected = tx.execute(
                r#"
                UPDATE price_manager SET
                    name = ?2, supplier_id = ?3, has_rrp = ?4, price_from = ?5, price_to = ?6,
                    date_from = ?7, date_to = ?8, source = ?9, fixed_price = ?10, dest = ?11,
                    markup = ?12, increase = ?13, deprecated = ?14, updated_at = ?15
                WHERE id = ?1
                "#,
                params![
                    rule.id,
                    rule.name,
                    rule.supplier_id,
                    rule.has_rrp,
                    decimal_to_sql(rule.price_from),
                    decimal_to_sql(rule.price_to),
                    date_to_sql(rule.date_from),
                    date_to_sql(rule.date_to),
                    rule.source.to_db_str(),
                    decimal_to_sql(rule.fixed_price),
                    rule.dest.column(),
                    decimal_to_sql(Some(rule.markup)),
                    decimal_to_sql(Some(rule.increase)),
                    rule.deprecated,
                    datetime_to_sql(rule.updated_at),
                ],
            )?;
            if affected == 0 {
                return Err(RepositoryError::not_found("price_manager", rule.id));
            }
            replace_links_tx(tx, rule)
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<PriceManager>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE pm.id = ?1", PRICE_MANAGER_SELECT);
        let rule = conn.query_row(&sql, params![id], map_price_manager).optional()?;
        Ok(rule)
    }

    pub fn get(&self, id: i64) -> RepositoryResult<PriceManager> {
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("price_manager", id))
    }

    pub fn find_by_supplier(&self, supplier_id: i64) -> RepositoryResult<Vec<PriceManager>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE pm.supplier_id = ?1 ORDER BY pm.id", PRICE_MANAGER_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![supplier_id], map_price_manager)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 全部未废弃规则（按 id 升序）
    pub fn find_not_deprecated(&self) -> RepositoryResult<Vec<PriceManager>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE pm.deprecated = 0 ORDER BY pm.id", PRICE_MANAGER_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_price_manager)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete(&self, id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Ok(conn.execute("DELETE FROM price_manager WHERE id = ?1", params![id])?)
    }

    pub fn set_deprecated_tx(tx: &Transaction, id: i64, now: DateTime<Utc>) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE price_manager SET deprecated = 1, updated_at = ?1 WHERE id = ?2",
            params![datetime_to_sql(now), id],
        )?;
        Ok(())
    }

    // ==========================================
    // PriceTag
    // ==========================================

    pub fn find_tags_by_rule(&self, price_manager_id: i64) -> RepositoryResult<Vec<PriceTag>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT main_product_id, price_manager_id, dest, source, markup, increase,
                   fixed_price, price, updated_at
            FROM price_tag WHERE price_manager_id = ?1 ORDER BY main_product_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![price_manager_id], map_price_tag)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 其他未废弃规则在同一目标字段上打过标签的主商品
    pub fn find_products_tagged_by_other_rules(
        &self,
        price_manager_id: i64,
        dest: MainPriceField,
    ) -> RepositoryResult<HashSet<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT t.main_product_id
            FROM price_tag t
            JOIN price_manager pm ON pm.id = t.price_manager_id
            WHERE t.dest = ?1 AND t.price_manager_id <> ?2 AND pm.deprecated = 0
            "#,
        )?;
        let rows = stmt
            .query_map(params![dest.column(), price_manager_id], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;
        Ok(rows)
    }

    pub fn upsert_tag_tx(tx: &Transaction, tag: &PriceTag) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO price_tag (
                main_product_id, price_manager_id, dest, source, markup, increase,
                fixed_price, price, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(main_product_id, price_manager_id, dest) DO UPDATE SET
                source = excluded.source,
                markup = excluded.markup,
                increase = excluded.increase,
                fixed_price = excluded.fixed_price,
                price = excluded.price,
                updated_at = excluded.updated_at
            "#,
            params![
                tag.main_product_id,
                tag.price_manager_id,
                tag.dest.column(),
                tag.source.to_db_str(),
                decimal_to_sql(Some(tag.markup)),
                decimal_to_sql(Some(tag.increase)),
                decimal_to_sql(tag.fixed_price),
                decimal_to_sql(Some(tag.price)),
                datetime_to_sql(tag.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 删除不在保留集合内的标签，返回删除数
    pub fn delete_tags_except_tx(
        tx: &Transaction,
        price_manager_id: i64,
        keep_product_ids: &HashSet<i64>,
    ) -> RepositoryResult<usize> {
        let existing: Vec<i64> = {
            let mut stmt =
                tx.prepare("SELECT main_product_id FROM price_tag WHERE price_manager_id = ?1")?;
            let rows = stmt.query_map(params![price_manager_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut stmt = tx.prepare(
            "DELETE FROM price_tag WHERE price_manager_id = ?1 AND main_product_id = ?2",
        )?;
        let mut removed = 0;
        for product_id in existing {
            if !keep_product_ids.contains(&product_id) {
                removed += stmt.execute(params![price_manager_id, product_id])?;
            }
        }
        Ok(removed)
    }

    pub fn delete_tags_by_rule_tx(tx: &Transaction, price_manager_id: i64) -> RepositoryResult<usize> {
        Ok(tx.execute(
            "DELETE FROM price_tag WHERE price_manager_id = ?1",
            params![price_manager_id],
        )?)
    }
}
