// ==========================================
// 供应商价目表管理系统 - 供应商仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::Supplier;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SupplierRepository - 供应商仓储
// ==========================================
pub struct SupplierRepository {
    conn: Arc<Mutex<Connection>>,
}

const SUPPLIER_COLUMNS: &str = "id, name, currency_rate, price_updated_at, stock_updated_at";

fn map_supplier(row: &Row) -> rusqlite::Result<Supplier> {
    Ok(Supplier {
        id: row.get(0)?,
        name: row.get(1)?,
        currency_rate: sql_types::opt_decimal(row, 2)?.unwrap_or(Decimal::ONE),
        price_updated_at: sql_types::opt_datetime(row, 3)?,
        stock_updated_at: sql_types::opt_datetime(row, 4)?,
    })
}

impl SupplierRepository {
    /// 创建新的 SupplierRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建供应商
    pub fn create(&self, name: &str, currency_rate: Decimal) -> RepositoryResult<Supplier> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO supplier (name, currency_rate) VALUES (?1, ?2)",
            params![name.trim(), sql_types::decimal_to_sql(Some(currency_rate))],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Supplier {
            id,
            name: name.trim().to_string(),
            currency_rate,
            price_updated_at: None,
            stock_updated_at: None,
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Supplier>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM supplier WHERE id = ?1", SUPPLIER_COLUMNS);
        let supplier = conn.query_row(&sql, params![id], map_supplier).optional()?;
        Ok(supplier)
    }

    /// 按主键查询，不存在时返回 NotFound
    pub fn get(&self, id: i64) -> RepositoryResult<Supplier> {
        self.find_by_id(id)?
            .ok_or_else(|| RepositoryError::not_found("supplier", id))
    }

    pub fn find_all(&self) -> RepositoryResult<Vec<Supplier>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM supplier ORDER BY id", SUPPLIER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let suppliers = stmt
            .query_map([], map_supplier)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suppliers)
    }

    /// 更新汇率乘数
    pub fn set_currency_rate(&self, id: i64, currency_rate: Decimal) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE supplier SET currency_rate = ?1 WHERE id = ?2",
            params![sql_types::decimal_to_sql(Some(currency_rate)), id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("supplier", id));
        }
        Ok(())
    }

    /// 刷新价格/库存的“最近更新”时间戳
    pub fn touch_updated_at(
        &self,
        id: i64,
        price: bool,
        stock: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        if !price && !stock {
            return Ok(());
        }
        let conn = self.get_conn()?;
        let ts = sql_types::datetime_to_sql(now);
        conn.execute(
            r#"
            UPDATE supplier SET
                price_updated_at = CASE WHEN ?2 THEN ?1 ELSE price_updated_at END,
                stock_updated_at = CASE WHEN ?3 THEN ?1 ELSE stock_updated_at END
            WHERE id = ?4
            "#,
            params![ts, price, stock, id],
        )?;
        Ok(())
    }
}
