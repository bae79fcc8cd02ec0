// ==========================================
// 供应商价目表管理系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合导入/定价/同步所需的所有 Repository
// 约束: 所有仓储共享同一个连接（单库、单写者）
// ==========================================

use crate::repository::{
    CatalogRepository, PriceManagerRepository, ProductRepository, SettingRepository,
    SupplierRepository,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// 目录仓储集合
///
/// 聚合引擎所需的所有 Repository，简化依赖注入。
#[derive(Clone)]
pub struct CatalogRepositories {
    pub supplier_repo: Arc<SupplierRepository>,
    pub catalog_repo: Arc<CatalogRepository>,
    pub setting_repo: Arc<SettingRepository>,
    pub product_repo: Arc<ProductRepository>,
    pub price_manager_repo: Arc<PriceManagerRepository>,
}

impl CatalogRepositories {
    /// 基于共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            supplier_repo: Arc::new(SupplierRepository::from_connection(conn.clone())),
            catalog_repo: Arc::new(CatalogRepository::from_connection(conn.clone())),
            setting_repo: Arc::new(SettingRepository::from_connection(conn.clone())),
            product_repo: Arc::new(ProductRepository::from_connection(conn.clone())),
            price_manager_repo: Arc::new(PriceManagerRepository::from_connection(conn)),
        }
    }
}
