// ==========================================
// 供应商价目表管理系统 - 导入层
// ==========================================
// 职责: 供应商价目表 → 规范目录
// 支持: Excel (.xls/.xlsx/.xlsm), CSV
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod import_trait;
pub mod supplier_importer_impl;
pub mod task_queue;
pub mod value_coercion;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::{ColumnMapper, ColumnSource, MappingOutcome};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use supplier_importer_impl::SupplierImporterImpl;
pub use task_queue::{ImportJob, ImportTaskQueue};
pub use value_coercion::{CellValue, CoercionError, ValueCoercer};

// 重导出 Trait 接口
pub use import_trait::{FileParser, SupplierImporter};
