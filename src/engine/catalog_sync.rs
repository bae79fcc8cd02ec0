// ==========================================
// 供应商价目表管理系统 - 目录批量同步
// ==========================================
// 阶段:
//   1. 为缺失检索向量的主商品补齐
//   2. 应用所有有效期内的规则
//   3. 废弃已过期的规则
//   4. 按关联供应商商品汇总主商品库存
// 输出: SyncReport（各阶段计数）
// ==========================================

use crate::domain::product::MainProduct;
use crate::engine::error::{PricingError, PricingResult};
use crate::engine::price_engine::PriceManagerEngine;
use crate::engine::repositories::CatalogRepositories;
use crate::repository::{ProductRepository, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// 重新汇总主商品库存（仅正库存计入），返回变化的主商品数
///
/// `only` 为 None 时处理全部主商品；无关联行的主商品库存归零。
pub fn refresh_aggregate_stock(
    repo: &ProductRepository,
    only: Option<&HashSet<i64>>,
    now: DateTime<Utc>,
) -> RepositoryResult<usize> {
    let totals = repo.linked_stock_totals()?;
    let mains: Vec<MainProduct> = match only {
        Some(ids) => {
            if ids.is_empty() {
                return Ok(0);
            }
            let ids: Vec<i64> = ids.iter().copied().collect();
            repo.find_main_products_by_ids(&ids)?.into_values().collect()
        }
        None => repo.find_all_main_products()?,
    };

    let changed: Vec<MainProduct> = mains
        .into_iter()
        .filter_map(|mut main| {
            let total = totals.get(&main.id).copied().unwrap_or(0);
            if main.stock == total {
                return None;
            }
            main.stock = total;
            Some(main)
        })
        .collect();
    if changed.is_empty() {
        return Ok(0);
    }

    repo.transaction(|tx| {
        for main in &changed {
            ProductRepository::update_main_stock_tx(tx, main.id, main.stock, now)?;
            ProductRepository::insert_log_tx(tx, &main.snapshot(now))?;
        }
        Ok(changed.len())
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    pub rule_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub search_vectors_refreshed: usize,
    pub rules_applied: usize,
    pub products_repriced: usize,
    pub rules_deprecated: usize,
    pub prices_cleared: usize,
    pub stock_refreshed: usize,
    pub rule_failures: Vec<RuleFailure>,
    pub elapsed_time: Duration,
}

// ==========================================
// SyncService
// ==========================================
pub struct SyncService {
    repos: CatalogRepositories,
    engine: Arc<PriceManagerEngine>,
}

impl SyncService {
    pub fn new(repos: CatalogRepositories, engine: Arc<PriceManagerEngine>) -> Self {
        Self { repos, engine }
    }

    #[instrument(skip(self))]
    pub fn run(&self, today: NaiveDate, now: DateTime<Utc>) -> PricingResult<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport {
            search_vectors_refreshed: self.refresh_search_vectors()?,
            ..Default::default()
        };

        // 规则应用与废弃: 单条规则的业务错误不阻断其余规则，数据库错误直接中止
        let rules = self.repos.price_manager_repo.find_not_deprecated()?;
        for rule in rules.iter().filter(|r| r.is_active_on(today)) {
            match self.engine.apply_rule(rule, now) {
                Ok(applied) => {
                    report.rules_applied += 1;
                    report.products_repriced += applied.changed;
                }
                Err(e @ PricingError::Repository(_)) => return Err(e),
                Err(e) => {
                    warn!(rule_id = rule.id, error = %e, "规则应用失败，已跳过");
                    report.rule_failures.push(RuleFailure {
                        rule_id: rule.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        for rule in rules.iter().filter(|r| r.is_expired_on(today)) {
            let deprecated = self.engine.deprecate(rule.id, now)?;
            if !deprecated.already_deprecated {
                report.rules_deprecated += 1;
                report.prices_cleared += deprecated.products_cleared;
            }
        }

        report.stock_refreshed = refresh_aggregate_stock(&self.repos.product_repo, None, now)?;
        report.elapsed_time = started.elapsed();

        info!(
            search_vectors = report.search_vectors_refreshed,
            rules_applied = report.rules_applied,
            repriced = report.products_repriced,
            deprecated = report.rules_deprecated,
            stock_refreshed = report.stock_refreshed,
            failures = report.rule_failures.len(),
            "目录同步完成"
        );
        Ok(report)
    }

    fn refresh_search_vectors(&self) -> RepositoryResult<usize> {
        let mut missing = self.repos.product_repo.find_main_products_missing_search_vector()?;
        if missing.is_empty() {
            return Ok(0);
        }
        let category_names = self.repos.catalog_repo.category_names()?;
        let manufacturer_names = self.repos.catalog_repo.manufacturer_names()?;

        for main in missing.iter_mut() {
            let category = main.category_id.and_then(|id| category_names.get(&id));
            let manufacturer = main.manufacturer_id.and_then(|id| manufacturer_names.get(&id));
            main.refresh_search_vector(category.map(String::as_str), manufacturer.map(String::as_str));
        }

        self.repos.product_repo.transaction(|tx| {
            for main in &missing {
                if let Some(vector) = main.search_vector.as_deref() {
                    ProductRepository::update_search_vector_tx(tx, main.id, vector)?;
                }
            }
            Ok(missing.len())
        })
    }
}
