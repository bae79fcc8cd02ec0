// ==========================================
// 供应商价目表管理系统 - 加价规则 API
// ==========================================
// 职责: 规则的创建/更新/查询/删除，以及应用与废弃
// 流程: 校验 → 冲突检测 → 落库；应用与废弃委托给 PriceManagerEngine
// ==========================================

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::PriceManagerValidator;
use crate::domain::price_manager::{PriceManager, PriceManagerDraft, PriceTag};
use crate::engine::price_engine::{ApplyReport, DeprecateReport, PriceManagerEngine};
use crate::repository::PriceManagerRepository;

// ==========================================
// PriceManagerApi - 加价规则 API
// ==========================================

/// 加价规则API
///
/// 职责：
/// 1. 规则草稿校验（非法规则不落库）
/// 2. 冲突检测（与同供应商、同目标字段的规则范围重叠时拒绝）
/// 3. 规则应用与废弃
pub struct PriceManagerApi {
    price_manager_repo: Arc<PriceManagerRepository>,
    engine: Arc<PriceManagerEngine>,
    validator: PriceManagerValidator,
}

impl PriceManagerApi {
    pub fn new(
        price_manager_repo: Arc<PriceManagerRepository>,
        engine: Arc<PriceManagerEngine>,
    ) -> Self {
        Self {
            price_manager_repo,
            engine,
            validator: PriceManagerValidator::new(),
        }
    }

    /// 创建规则
    ///
    /// # 返回
    /// - Ok(PriceManager): 已落库的规则
    /// - Err(ApiError::ValidationError): 草稿非法
    /// - Err(ApiError::RuleConflict): 与已有规则冲突，未写入
    pub fn create_rule(&self, draft: PriceManagerDraft, now: DateTime<Utc>) -> ApiResult<PriceManager> {
        let source = self.validator.validate(&draft)?;
        let rule = draft.into_rule(0, source, now);
        self.engine.ensure_no_conflict(&rule)?;

        let saved = self.price_manager_repo.create(&rule)?;
        tracing::info!(rule_id = saved.id, name = %saved.name, "加价规则已创建");
        Ok(saved)
    }

    /// 更新规则（已废弃规则不可修改）
    pub fn update_rule(
        &self,
        rule_id: i64,
        draft: PriceManagerDraft,
        now: DateTime<Utc>,
    ) -> ApiResult<PriceManager> {
        let existing = self.get_rule(rule_id)?;
        if existing.deprecated {
            return Err(ApiError::BusinessRuleViolation(format!(
                "规则{}已废弃，不能修改",
                rule_id
            )));
        }

        let source = self.validator.validate(&draft)?;
        let mut rule = draft.into_rule(rule_id, source, now);
        rule.created_at = existing.created_at;
        self.engine.ensure_no_conflict(&rule)?;

        self.price_manager_repo.update(&rule)?;
        tracing::info!(rule_id, "加价规则已更新");
        Ok(rule)
    }

    pub fn get_rule(&self, rule_id: i64) -> ApiResult<PriceManager> {
        self.price_manager_repo
            .find_by_id(rule_id)?
            .ok_or_else(|| ApiError::NotFound(format!("加价规则(id={})不存在", rule_id)))
    }

    pub fn list_rules(&self, supplier_id: i64) -> ApiResult<Vec<PriceManager>> {
        Ok(self.price_manager_repo.find_by_supplier(supplier_id)?)
    }

    pub fn list_tags(&self, rule_id: i64) -> ApiResult<Vec<PriceTag>> {
        Ok(self.price_manager_repo.find_tags_by_rule(rule_id)?)
    }

    /// 删除规则（价格标签级联删除，已写入的价格保留）
    pub fn delete_rule(&self, rule_id: i64) -> ApiResult<()> {
        if self.price_manager_repo.delete(rule_id)? == 0 {
            return Err(ApiError::NotFound(format!("加价规则(id={})不存在", rule_id)));
        }
        Ok(())
    }

    pub fn apply_rule(&self, rule_id: i64, now: DateTime<Utc>) -> ApiResult<ApplyReport> {
        Ok(self.engine.apply(rule_id, now)?)
    }

    pub fn deprecate_rule(&self, rule_id: i64, now: DateTime<Utc>) -> ApiResult<DeprecateReport> {
        Ok(self.engine.deprecate(rule_id, now)?)
    }
}
