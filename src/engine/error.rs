// ==========================================
// 供应商价目表管理系统 - 引擎层错误类型
// ==========================================
// 职责: 定价规则引擎与批量同步的错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("加价规则不存在: id={0}")]
    RuleNotFound(i64),

    #[error("加价规则已废弃，不能再应用: id={0}")]
    RuleDeprecated(i64),

    #[error("加价规则冲突: 与规则 {conflicting_id}（{name}）的适用范围重叠")]
    RuleConflict { conflicting_id: i64, name: String },

    #[error("汇率不可用: supplier_id={supplier_id}, {message}")]
    CurrencyUnavailable { supplier_id: i64, message: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PricingResult<T> = Result<T, PricingError>;
