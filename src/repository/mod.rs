// ==========================================
// 供应商价目表管理系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod catalog_repo;
pub mod error;
pub mod price_manager_repo;
pub mod product_repo;
pub mod setting_repo;
pub mod sql_types;
pub mod supplier_repo;

// 重导出核心仓储
pub use catalog_repo::CatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use price_manager_repo::PriceManagerRepository;
pub use product_repo::ProductRepository;
pub use setting_repo::SettingRepository;
pub use supplier_repo::SupplierRepository;
