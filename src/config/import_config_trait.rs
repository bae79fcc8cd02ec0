// ==========================================
// 供应商价目表管理系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管线所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::config_manager::ConfigResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ==========================================
// ImportOptions - 单次导入使用的参数快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub strict_numeric: bool,
    pub fuzzy_threshold: f64,
    pub category_delimiter: String,
    pub category_max_depth: usize,
    pub error_summary_limit: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            strict_numeric: false,
            fuzzy_threshold: 0.85,
            category_delimiter: ">".to_string(),
            category_max_depth: 10,
            error_summary_limit: 5,
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 严格数值模式：无法解析的数值记为行错误而不是归零
    ///
    /// # 默认值
    /// - false
    async fn get_strict_numeric(&self) -> ConfigResult<bool>;

    /// 厂商模糊匹配阈值（normalized Levenshtein，0~1）
    ///
    /// # 默认值
    /// - 0.85
    async fn get_fuzzy_threshold(&self) -> ConfigResult<f64>;

    /// 品类路径分隔符
    ///
    /// # 默认值
    /// - ">"
    async fn get_category_delimiter(&self) -> ConfigResult<String>;

    /// 品类最大层级，超出部分截断
    ///
    /// # 默认值
    /// - 10
    async fn get_category_max_depth(&self) -> ConfigResult<usize>;

    /// 导入报告中错误摘要的条数
    ///
    /// # 默认值
    /// - 5
    async fn get_error_summary_limit(&self) -> ConfigResult<usize>;

    /// 一次性读取全部导入参数
    async fn load_import_options(&self) -> ConfigResult<ImportOptions> {
        Ok(ImportOptions {
            strict_numeric: self.get_strict_numeric().await?,
            fuzzy_threshold: self.get_fuzzy_threshold().await?,
            category_delimiter: self.get_category_delimiter().await?,
            category_max_depth: self.get_category_max_depth().await?,
            error_summary_limit: self.get_error_summary_limit().await?,
        })
    }
}
