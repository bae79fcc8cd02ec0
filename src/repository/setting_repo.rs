// ==========================================
// 供应商价目表管理系统 - 导入配置仓储
// ==========================================
// 职责: setting / link / dict 的 CRUD
// 约束: link 唯一 (setting_id, key)；dict 唯一 (link_id, key, value)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::setting::{DictEntry, Link, Setting};
use crate::domain::types::FieldKey;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SettingRepository
// ==========================================
pub struct SettingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SettingRepository {
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

    /// 创建配置（links 字段忽略，使用 upsert_link 逐个添加）
    pub fn create_setting(&self, setting: &Setting) -> RepositoryResult<Setting> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO setting (
                name, supplier_id, sheet_name, differ_by_name, priced_only,
                create_new, update_main, update_main_content
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                setting.name,
                setting.supplier_id,
                setting.sheet_name,
                setting.differ_by_name,
                setting.priced_only,
                setting.create_new,
                setting.update_main,
                setting.update_main_content,
            ],
        )?;
        let mut saved = setting.clone();
        saved.id = conn.last_insert_rowid();
        saved.links.clear();
        Ok(saved)
    }

    /// 绑定字段与列（同一 setting 下同 key 覆盖）
    pub fn upsert_link(
        &self,
        setting_id: i64,
        key: FieldKey,
        column: Option<&str>,
        initial: Option<&str>,
    ) -> RepositoryResult<Link> {
        let conn = self.get_conn()?;
        let id: i64 = conn.query_row(
            r#"
            INSERT INTO link (setting_id, key, value, initial) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(setting_id, key) DO UPDATE SET
                value = excluded.value,
                initial = excluded.initial
            RETURNING id
            "#,
            params![setting_id, key.key(), column, initial],
            |row| row.get(0),
        )?;
        Ok(Link {
            id,
            setting_id,
            key,
            column: column.map(str::to_string),
            initial: initial.map(str::to_string),
            dict: Vec::new(),
        })
    }

    /// 添加值替换对（重复时忽略）
    pub fn add_dict_entry(&self, link_id: i64, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO dict (link_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(link_id, key, value) DO NOTHING",
            params![link_id, key, value],
        )?;
        Ok(())
    }

    /// 读取配置及其全部 Link / Dict
    pub fn find_with_links(&self, setting_id: i64) -> RepositoryResult<Option<Setting>> {
        let conn = self.get_conn()?;
        let setting = conn
            .query_row(
                r#"
                SELECT id, name, supplier_id, sheet_name, differ_by_name, priced_only,
                       create_new, update_main, update_main_content
                FROM setting WHERE id = ?1
                "#,
                params![setting_id],
                |row| {
                    Ok(Setting {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        supplier_id: row.get(2)?,
                        sheet_name: row.get(3)?,
                        differ_by_name: row.get(4)?,
                        priced_only: row.get(5)?,
                        create_new: row.get(6)?,
                        update_main: row.get(7)?,
                        update_main_content: row.get(8)?,
                        links: Vec::new(),
                    })
                },
            )
            .optional()?;

        let mut setting = match setting {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut link_stmt = conn.prepare(
            "SELECT id, setting_id, key, value, initial FROM link WHERE setting_id = ?1 ORDER BY id",
        )?;
        let raw_links = link_stmt
            .query_map(params![setting_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut dict_stmt = conn.prepare(
            "SELECT id, link_id, key, value FROM dict WHERE link_id = ?1 ORDER BY id",
        )?;
        for (id, setting_id, key, column, initial) in raw_links {
            let key = FieldKey::from_key(&key).ok_or_else(|| RepositoryError::FieldValueError {
                field: "link.key".to_string(),
                message: format!("未知字段键: {}", key),
            })?;
            let dict = dict_stmt
                .query_map(params![id], |row| {
                    Ok(DictEntry {
                        id: row.get(0)?,
                        link_id: row.get(1)?,
                        key: row.get(2)?,
                        value: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            setting.links.push(Link {
                id,
                setting_id,
                key,
                column,
                initial,
                dict,
            });
        }

        Ok(Some(setting))
    }

    /// 删除配置（Link / Dict 级联删除）
    pub fn delete_setting(&self, setting_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Ok(conn.execute("DELETE FROM setting WHERE id = ?1", params![setting_id])?)
    }
}
