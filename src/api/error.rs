// ==========================================
// 供应商价目表管理系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把 Repository / 导入 / 定价错误转换为用户可读的消息
// 约束: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::error::PricingError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    /// 规则冲突: 携带已存在规则的 id 与名称
    #[error("加价规则冲突: 与规则 {rule_id}（{name}）重叠")]
    RuleConflict { rule_id: i64, name: String },

    /// 校验失败（带详细原因）
    #[error("数据校验失败: {reason}")]
    ValidationError {
        reason: String,
        violations: Vec<ValidationViolation>,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(inner) => ApiError::from(inner),
            ImportError::SettingNotFound(id) => {
                ApiError::NotFound(format!("导入配置(id={})不存在", id))
            }
            ImportError::InvalidSetting(msg) => ApiError::InvalidInput(msg),
            ImportError::Other(err) => ApiError::Other(err),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

// ==========================================
// 从 PricingError 转换
// ==========================================
impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::RuleNotFound(id) => {
                ApiError::NotFound(format!("加价规则(id={})不存在", id))
            }
            PricingError::RuleConflict {
                conflicting_id,
                name,
            } => ApiError::RuleConflict {
                rule_id: conflicting_id,
                name,
            },
            PricingError::RuleDeprecated(_) | PricingError::CurrencyUnavailable { .. } => {
                ApiError::BusinessRuleViolation(err.to_string())
            }
            PricingError::Repository(inner) => ApiError::from(inner),
            PricingError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 校验违规详情
// ==========================================
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationViolation {
    /// 违规字段
    pub field: String,
    /// 违规原因
    pub reason: String,
}

impl ValidationViolation {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err: ApiError = RepositoryError::not_found("supplier", 7).into();
        assert!(matches!(err, ApiError::NotFound(ref msg) if msg.contains("supplier(id=7)")));
    }

    #[test]
    fn test_pricing_conflict_keeps_rule_identity() {
        let err: ApiError = PricingError::RuleConflict {
            conflicting_id: 3,
            name: "Bosch base".to_string(),
        }
        .into();
        match err {
            ApiError::RuleConflict { rule_id, name } => {
                assert_eq!(rule_id, 3);
                assert_eq!(name, "Bosch base");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_import_error_translation() {
        let err: ApiError = ImportError::SettingNotFound(9).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = ImportError::UnsupportedFormat("ods".to_string()).into();
        assert!(matches!(err, ApiError::ImportError(_)));
    }
}
