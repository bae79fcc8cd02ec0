// ==========================================
// 供应商价目表管理系统 - 目录数据仓储
// ==========================================
// 职责: manufacturer / manufacturer_dict / category / discount_group 的 CRUD
// 红线: Repository 不含业务逻辑（匹配策略在 engine 层）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::{Category, DiscountGroup, Manufacturer, ManufacturerAlias};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// CatalogRepository
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        path: row.get(3)?,
        depth: row.get(4)?,
    })
}

impl CatalogRepository {
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

    // ==========================================
    // 厂商
    // ==========================================

    /// 全部规范厂商（按 id 升序，模糊匹配“先到先得”依赖此顺序）
    pub fn list_manufacturers(&self) -> RepositoryResult<Vec<Manufacturer>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM manufacturer ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Manufacturer {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn create_manufacturer(&self, name: &str) -> RepositoryResult<Manufacturer> {
        let conn = self.get_conn()?;
        conn.execute("INSERT INTO manufacturer (name) VALUES (?1)", params![name])?;
        Ok(Manufacturer {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn list_manufacturer_aliases(&self) -> RepositoryResult<Vec<ManufacturerAlias>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, alias, manufacturer_id FROM manufacturer_dict ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ManufacturerAlias {
                    id: row.get(0)?,
                    alias: row.get(1)?,
                    manufacturer_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 写入别名（已存在时保持原映射）
    pub fn create_manufacturer_alias(
        &self,
        alias: &str,
        manufacturer_id: i64,
    ) -> RepositoryResult<ManufacturerAlias> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO manufacturer_dict (alias, manufacturer_id) VALUES (?1, ?2)
             ON CONFLICT(alias) DO NOTHING",
            params![alias, manufacturer_id],
        )?;
        let saved = conn.query_row(
            "SELECT id, alias, manufacturer_id FROM manufacturer_dict WHERE alias = ?1",
            params![alias],
            |row| {
                Ok(ManufacturerAlias {
                    id: row.get(0)?,
                    alias: row.get(1)?,
                    manufacturer_id: row.get(2)?,
                })
            },
        )?;
        Ok(saved)
    }

    /// id → 名称
    pub fn manufacturer_names(&self) -> RepositoryResult<HashMap<i64, String>> {
        Ok(self
            .list_manufacturers()?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect())
    }

    // ==========================================
    // 品类
    // ==========================================

    pub fn find_category_by_path(&self, path: &str) -> RepositoryResult<Option<Category>> {
        let conn = self.get_conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, parent_id, path, depth FROM category WHERE path = ?1",
                params![path],
                map_category,
            )
            .optional()?;
        Ok(category)
    }

    /// 按 (parent, name) 获取或创建
    pub fn get_or_create_category(
        &self,
        name: &str,
        parent: Option<&Category>,
        path: &str,
    ) -> RepositoryResult<Category> {
        let conn = self.get_conn()?;
        let depth = parent.map_or(1, |p| p.depth + 1);
        conn.execute(
            "INSERT INTO category (name, parent_id, path, depth) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO NOTHING",
            params![name, parent.map(|p| p.id), path, depth],
        )?;
        let category = conn.query_row(
            "SELECT id, name, parent_id, path, depth FROM category WHERE path = ?1",
            params![path],
            map_category,
        )?;
        Ok(category)
    }

    pub fn find_category_by_id(&self, id: i64) -> RepositoryResult<Option<Category>> {
        let conn = self.get_conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, parent_id, path, depth FROM category WHERE id = ?1",
                params![id],
                map_category,
            )
            .optional()?;
        Ok(category)
    }

    /// 子孙节点（物化路径前缀查询）
    pub fn find_category_descendants(&self, category: &Category) -> RepositoryResult<Vec<Category>> {
        let conn = self.get_conn()?;
        let prefix = format!("{}{}", category.path, crate::domain::catalog::CATEGORY_PATH_SEPARATOR);
        let mut stmt = conn.prepare(
            "SELECT id, name, parent_id, path, depth FROM category
             WHERE substr(path, 1, length(?1)) = ?1 ORDER BY path",
        )?;
        let rows = stmt
            .query_map(params![prefix], map_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_categories(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM category", [], |row| row.get(0))?)
    }

    /// id → 叶子名称
    pub fn category_names(&self) -> RepositoryResult<HashMap<i64, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM category")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    // ==========================================
    // 折扣组
    // ==========================================

    pub fn get_or_create_discount_group(
        &self,
        supplier_id: i64,
        name: &str,
    ) -> RepositoryResult<DiscountGroup> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO discount_group (supplier_id, name) VALUES (?1, ?2)
             ON CONFLICT(supplier_id, name) DO NOTHING",
            params![supplier_id, name],
        )?;
        let group = conn.query_row(
            "SELECT id, supplier_id, name FROM discount_group WHERE supplier_id = ?1 AND name = ?2",
            params![supplier_id, name],
            |row| {
                Ok(DiscountGroup {
                    id: row.get(0)?,
                    supplier_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )?;
        Ok(group)
    }

    pub fn list_discount_groups(&self, supplier_id: i64) -> RepositoryResult<Vec<DiscountGroup>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, supplier_id, name FROM discount_group WHERE supplier_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![supplier_id], |row| {
                Ok(DiscountGroup {
                    id: row.get(0)?,
                    supplier_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
