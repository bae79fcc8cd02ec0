// ==========================================
// 供应商价目表管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ImportConfigReader, ImportOptions};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?)
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON 格式，键有序）
    ///
    /// # 用途
    /// - 附在导入报告中，复盘时还原当时的匹配参数
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置（覆盖同名 global 配置）
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in &config_map {
                count += stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;

        Ok(count)
    }

    fn parse_or_default<T: std::str::FromStr>(&self, key: &str, default: T) -> ConfigResult<T> {
        let raw = self.get_global_config_value(key)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(default),
            Some(value) => match value.parse::<T>() {
                Ok(parsed) => Ok(parsed),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %value, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_strict_numeric(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::IMPORT_STRICT_NUMERIC, "false")?;
        Ok(matches!(
            value.to_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ))
    }

    async fn get_fuzzy_threshold(&self) -> ConfigResult<f64> {
        let default = ImportOptions::default().fuzzy_threshold;
        let value = self.parse_or_default(config_keys::MANUFACTURER_FUZZY_THRESHOLD, default)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            tracing::warn!(threshold = value, "模糊匹配阈值超出 [0, 1]，使用默认值");
            Ok(default)
        }
    }

    async fn get_category_delimiter(&self) -> ConfigResult<String> {
        // 分隔符不做 trim 以外的处理；空值回退默认
        self.get_config_or_default(config_keys::CATEGORY_DELIMITER, ">")
    }

    async fn get_category_max_depth(&self) -> ConfigResult<usize> {
        let value = self.parse_or_default(config_keys::CATEGORY_MAX_DEPTH, 10usize)?;
        Ok(value.max(1))
    }

    async fn get_error_summary_limit(&self) -> ConfigResult<usize> {
        self.parse_or_default(config_keys::IMPORT_ERROR_SUMMARY_LIMIT, 5usize)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 数值转换
    pub const IMPORT_STRICT_NUMERIC: &str = "import.strict_numeric";

    // 导入报告
    pub const IMPORT_ERROR_SUMMARY_LIMIT: &str = "import.error_summary_limit";

    // 厂商匹配
    pub const MANUFACTURER_FUZZY_THRESHOLD: &str = "manufacturer.fuzzy_threshold";

    // 品类
    pub const CATEGORY_DELIMITER: &str = "category.delimiter";
    pub const CATEGORY_MAX_DEPTH: &str = "category.max_depth";
}
