// ==========================================
// 供应商价目表管理系统 - 应用状态
// ==========================================
// 职责: 打开共享连接、建表，装配仓储/配置/引擎/API
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ImportApi, PriceManagerApi};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{CatalogRepositories, PriceManagerEngine, SyncService};
use crate::importer::task_queue::DEFAULT_QUEUE_CAPACITY;
use crate::importer::SupplierImporterImpl;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "PRICE_LIST_MANAGER_DB_PATH";

/// 默认数据库文件
pub const DEFAULT_DB_FILE: &str = "./price_list_manager.db";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 仓储集合（共享同一连接）
    pub repos: CatalogRepositories,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 加价规则引擎
    pub price_engine: Arc<PriceManagerEngine>,

    /// 目录批量同步
    pub sync_service: Arc<SyncService>,

    /// 加价规则API
    pub price_manager_api: Arc<PriceManagerApi>,

    /// 导入API（持有后台导入队列）
    pub import_api: ImportApi,
}

impl AppState {
    /// 创建新的AppState实例（需在 tokio 运行时内调用）
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化表结构
    /// 2. 初始化所有Repository与ConfigManager
    /// 3. 创建引擎与API实例，启动后台导入队列
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // Repository / 配置
        // ==========================================
        let repos = CatalogRepositories::from_connection(conn.clone());
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let import_options = config_manager
            .load_import_options()
            .await
            .map_err(|e| format!("导入配置读取失败: {}", e))?;

        // ==========================================
        // Engine
        // ==========================================
        let price_engine = Arc::new(PriceManagerEngine::new(repos.clone()));
        let sync_service = Arc::new(SyncService::new(repos.clone(), price_engine.clone()));
        let importer = Arc::new(SupplierImporterImpl::new(repos.clone(), config_manager.clone()));

        // ==========================================
        // API
        // ==========================================
        let price_manager_api = Arc::new(PriceManagerApi::new(
            repos.price_manager_repo.clone(),
            price_engine.clone(),
        ));
        let import_api = ImportApi::new(
            importer,
            repos.setting_repo.clone(),
            DEFAULT_QUEUE_CAPACITY,
            import_options.error_summary_limit,
        );

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            repos,
            config_manager,
            price_engine,
            sync_service,
            price_manager_api,
            import_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先读取环境变量 PRICE_LIST_MANAGER_DB_PATH，否则使用当前目录下的 price_list_manager.db
pub fn get_default_db_path() -> String {
    match std::env::var(DB_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => path.trim().to_string(),
        _ => DEFAULT_DB_FILE.to_string(),
    }
}
