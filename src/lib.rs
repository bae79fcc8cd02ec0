// ==========================================
// 供应商价目表管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 职责: 供应商价目表导入对账、规范目录维护、加价规则计算
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 解析器与加价规则
pub mod engine;

// 导入层 - 外部价目表
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 边界校验与错误转换
pub mod api;

// 应用层 - 实例装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{FieldKey, MainPriceField, PriceSource, SupplierPriceField};

// 领域实体
pub use domain::{
    Category, ImportReport, MainProduct, Manufacturer, PriceManager, PriceTag, Setting,
    Supplier, SupplierProduct,
};

// 引擎
pub use engine::{PriceManagerEngine, SyncService};

// API
pub use api::{ImportApi, PriceManagerApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "供应商价目表管理系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
