// ==========================================
// 供应商价目表管理系统 - 引擎层
// ==========================================
// 职责: 厂商/品类解析、加价规则计算与应用、目录批量同步
// 约束: 引擎不拼 SQL，数据访问全部经由 repository 层
// ==========================================

pub mod catalog_sync;
pub mod category_resolver;
pub mod error;
pub mod manufacturer_resolver;
pub mod price_engine;
pub mod repositories;
pub mod rule_filter;

// 重导出核心引擎
pub use catalog_sync::{refresh_aggregate_stock, SyncReport, SyncService};
pub use category_resolver::CategoryResolver;
pub use error::{PricingError, PricingResult};
pub use manufacturer_resolver::{ManufacturerMatch, ManufacturerResolver, MatchTier};
pub use price_engine::{
    ApplyReport, CurrencyRateProvider, DeprecateReport, PriceManagerEngine, SupplierCurrencyRates,
};
pub use repositories::CatalogRepositories;
pub use rule_filter::{Candidate, RuleFilter, RulePredicate};
