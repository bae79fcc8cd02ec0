// ==========================================
// 供应商价目表管理系统 - API 层
// ==========================================
// 职责: 边界校验与错误转换，供 CLI 与上层调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod price_manager_api;
pub mod validator;

// 重导出核心类型
pub use error::{ApiError, ApiResult, ValidationViolation};
pub use import_api::{ImportApi, ImportApiResponse};
pub use price_manager_api::PriceManagerApi;
pub use validator::PriceManagerValidator;
