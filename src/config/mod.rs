// ==========================================
// 供应商价目表管理系统 - 配置层
// ==========================================
// 职责: 系统配置管理（导入/匹配参数）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ConfigResult};
pub use import_config_trait::{ImportConfigReader, ImportOptions};
