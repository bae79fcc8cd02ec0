// ==========================================
// 供应商价目表管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、字段清单、导入中间结构
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod import;
pub mod price_manager;
pub mod product;
pub mod setting;
pub mod types;

// 重导出核心类型
pub use catalog::{Category, DiscountGroup, Manufacturer, ManufacturerAlias, Supplier};
pub use import::{ImportReport, ImportSummary, MappedRow, RawSheet, RowError};
pub use price_manager::{PriceManager, PriceManagerDraft, PriceTag};
pub use product::{MainProduct, MainProductLog, SupplierProduct};
pub use setting::{DictEntry, Link, Setting};
pub use types::{FieldKey, MainPriceField, PriceSource, SupplierPriceField, ValueKind};
