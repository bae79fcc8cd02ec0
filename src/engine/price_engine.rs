// ==========================================
// 供应商价目表管理系统 - 定价规则引擎
// ==========================================
// 计算:
//   供应商来源 → 每个主商品取匹配行的最小正值 × 汇率 → ceil(v*(1+markup/100)+increase)
//   主商品来源 → 同一公式，不乘汇率
//   固定价     → ceil(fixed_price)
// 应用: 单事务内 写价格 + 历史(仅变化) + 价格标签 upsert + 清理失配标签
// 废弃: 删除标签、清空目标字段(记历史)、标记 deprecated（不可逆）
// ==========================================

use crate::domain::price_manager::{PriceManager, PriceTag};
use crate::domain::product::{MainProduct, SupplierProduct};
use crate::domain::types::PriceSource;
use crate::engine::error::{PricingError, PricingResult};
use crate::engine::repositories::CatalogRepositories;
use crate::engine::rule_filter::{Candidate, RuleFilter};
use crate::repository::{PriceManagerRepository, ProductRepository, SupplierRepository};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

// ==========================================
// 汇率接口
// ==========================================
pub trait CurrencyRateProvider: Send + Sync {
    /// 供应商币种 → 本币的乘数
    fn rate_for(&self, supplier_id: i64) -> PricingResult<Decimal>;
}

/// 默认实现: 读取 supplier.currency_rate
pub struct SupplierCurrencyRates {
    supplier_repo: Arc<SupplierRepository>,
}

impl SupplierCurrencyRates {
    pub fn new(supplier_repo: Arc<SupplierRepository>) -> Self {
        Self { supplier_repo }
    }
}

impl CurrencyRateProvider for SupplierCurrencyRates {
    fn rate_for(&self, supplier_id: i64) -> PricingResult<Decimal> {
        let supplier = self.supplier_repo.get(supplier_id)?;
        if supplier.currency_rate <= Decimal::ZERO {
            return Err(PricingError::CurrencyUnavailable {
                supplier_id,
                message: format!("汇率必须为正数，当前值 {}", supplier.currency_rate),
            });
        }
        Ok(supplier.currency_rate)
    }
}

// ==========================================
// 纯计算函数
// ==========================================

/// ceil(value * (1 + markup/100) + increase)
pub fn apply_markup(value: Decimal, markup: Decimal, increase: Decimal) -> Decimal {
    (value * (Decimal::ONE + markup / Decimal::ONE_HUNDRED) + increase).ceil()
}

/// 计算单个主商品的目标价；无可用来源值时返回 None
pub fn compute_price(
    rule: &PriceManager,
    main_product: &MainProduct,
    matched_rows: &[&SupplierProduct],
    currency_rate: Decimal,
) -> Option<Decimal> {
    match rule.source {
        PriceSource::Supplier(field) => matched_rows
            .iter()
            .filter_map(|row| row.price(field))
            .filter(|value| *value > Decimal::ZERO)
            .min()
            .map(|min| apply_markup(min * currency_rate, rule.markup, rule.increase)),
        PriceSource::Main(field) => main_product
            .price(field)
            .map(|value| apply_markup(value, rule.markup, rule.increase)),
        PriceSource::FixedPrice => rule.fixed_price.map(|price| price.ceil()),
    }
}

/// 闭区间重叠；未设置的端点视为 ∓∞
pub fn bands_overlap(
    a_from: Option<Decimal>,
    a_to: Option<Decimal>,
    b_from: Option<Decimal>,
    b_to: Option<Decimal>,
) -> bool {
    let a_starts_before_b_ends = match (a_from, b_to) {
        (Some(from), Some(to)) => from <= to,
        _ => true,
    };
    let b_starts_before_a_ends = match (b_from, a_to) {
        (Some(from), Some(to)) => from <= to,
        _ => true,
    };
    a_starts_before_b_ends && b_starts_before_a_ends
}

/// 折扣组范围重叠: 任一方为空（不限）或存在交集
pub fn discount_scopes_overlap(a: &[i64], b: &[i64]) -> bool {
    a.is_empty() || b.is_empty() || a.iter().any(|id| b.contains(id))
}

/// 两条规则是否冲突（已废弃规则永不冲突）
pub fn rules_conflict(a: &PriceManager, b: &PriceManager) -> bool {
    if a.deprecated || b.deprecated {
        return false;
    }
    if a.id != 0 && a.id == b.id {
        return false;
    }
    a.supplier_id == b.supplier_id
        && a.dest == b.dest
        && discount_scopes_overlap(&a.discount_group_ids, &b.discount_group_ids)
        && bands_overlap(a.price_from, a.price_to, b.price_from, b.price_to)
}

// ==========================================
// 结果类型
// ==========================================

#[derive(Debug, Clone)]
pub struct PricedProduct {
    pub main_product: MainProduct,
    pub price: Decimal,
}

/// 规则命中集合
#[derive(Debug, Clone, Default)]
pub struct FittingSet {
    pub products: Vec<PricedProduct>,
    /// 命中过滤条件但无法得出价格的主商品数
    pub unpriced: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub rule_id: i64,
    pub fitted: usize,
    pub changed: usize,
    pub unpriced: usize,
    pub tags_written: usize,
    pub tags_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeprecateReport {
    pub rule_id: i64,
    pub tags_removed: usize,
    pub products_cleared: usize,
    pub already_deprecated: bool,
}

// ==========================================
// PriceManagerEngine
// ==========================================
pub struct PriceManagerEngine {
    repos: CatalogRepositories,
    rates: Arc<dyn CurrencyRateProvider>,
}

impl PriceManagerEngine {
    /// 使用 supplier.currency_rate 作为汇率来源
    pub fn new(repos: CatalogRepositories) -> Self {
        let rates = Arc::new(SupplierCurrencyRates::new(repos.supplier_repo.clone()));
        Self { repos, rates }
    }

    pub fn with_rates(repos: CatalogRepositories, rates: Arc<dyn CurrencyRateProvider>) -> Self {
        Self { repos, rates }
    }

    fn load_rule(&self, rule_id: i64) -> PricingResult<PriceManager> {
        self.repos
            .price_manager_repo
            .find_by_id(rule_id)?
            .ok_or(PricingError::RuleNotFound(rule_id))
    }

    /// 查找与给定规则冲突的第一条已有规则
    pub fn find_conflict(&self, rule: &PriceManager) -> PricingResult<Option<PriceManager>> {
        let existing = self.repos.price_manager_repo.find_by_supplier(rule.supplier_id)?;
        Ok(existing.into_iter().find(|other| rules_conflict(rule, other)))
    }

    pub fn ensure_no_conflict(&self, rule: &PriceManager) -> PricingResult<()> {
        match self.find_conflict(rule)? {
            Some(other) => Err(PricingError::RuleConflict {
                conflicting_id: other.id,
                name: other.name,
            }),
            None => Ok(()),
        }
    }

    /// 计算规则命中的主商品及其目标价
    pub fn fitting_products(&self, rule: &PriceManager) -> PricingResult<FittingSet> {
        let product_repo = &self.repos.product_repo;
        let supplier_products = product_repo.find_supplier_products(rule.supplier_id)?;
        let main_ids: Vec<i64> = supplier_products
            .iter()
            .filter_map(|p| p.main_product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mains = product_repo.find_main_products_by_ids(&main_ids)?;

        let fits = RuleFilter::for_rule(rule).into_predicate();
        let mut matched: BTreeMap<i64, Vec<&SupplierProduct>> = BTreeMap::new();
        for row in &supplier_products {
            let Some(main) = row.main_product_id.and_then(|id| mains.get(&id)) else {
                continue;
            };
            if fits(&Candidate::new(row, main)) {
                matched.entry(main.id).or_default().push(row);
            }
        }

        let currency_rate = match rule.source {
            PriceSource::Supplier(_) if !matched.is_empty() => {
                self.rates.rate_for(rule.supplier_id)?
            }
            _ => Decimal::ONE,
        };

        let mut fitting = FittingSet::default();
        for (main_id, rows) in matched {
            let Some(main) = mains.get(&main_id) else {
                continue;
            };
            match compute_price(rule, main, &rows, currency_rate) {
                Some(price) => fitting.products.push(PricedProduct {
                    main_product: main.clone(),
                    price,
                }),
                None => fitting.unpriced += 1,
            }
        }
        Ok(fitting)
    }

    /// 按 id 应用规则
    pub fn apply(&self, rule_id: i64, now: DateTime<Utc>) -> PricingResult<ApplyReport> {
        let rule = self.load_rule(rule_id)?;
        self.apply_rule(&rule, now)
    }

    /// 应用规则；重复应用结果不变
    #[instrument(skip(self, rule), fields(rule_id = rule.id, supplier_id = rule.supplier_id))]
    pub fn apply_rule(&self, rule: &PriceManager, now: DateTime<Utc>) -> PricingResult<ApplyReport> {
        if rule.deprecated {
            return Err(PricingError::RuleDeprecated(rule.id));
        }

        let fitting = self.fitting_products(rule)?;
        let keep: HashSet<i64> = fitting
            .products
            .iter()
            .map(|p| p.main_product.id)
            .collect();

        let (changed, tags_removed) = self.repos.product_repo.transaction(|tx| {
            let mut changed = 0;
            for priced in &fitting.products {
                if priced.main_product.price(rule.dest) != Some(priced.price) {
                    let mut updated = priced.main_product.clone();
                    updated.set_price(rule.dest, Some(priced.price));
                    ProductRepository::update_main_price_tx(
                        tx,
                        updated.id,
                        rule.dest,
                        Some(priced.price),
                        now,
                    )?;
                    ProductRepository::insert_log_tx(tx, &updated.snapshot(now))?;
                    changed += 1;
                }
                PriceManagerRepository::upsert_tag_tx(
                    tx,
                    &PriceTag::for_rule(rule, priced.main_product.id, priced.price, now),
                )?;
            }
            let removed = PriceManagerRepository::delete_tags_except_tx(tx, rule.id, &keep)?;
            Ok((changed, removed))
        })?;

        let report = ApplyReport {
            rule_id: rule.id,
            fitted: fitting.products.len(),
            changed,
            unpriced: fitting.unpriced,
            tags_written: fitting.products.len(),
            tags_removed,
        };
        info!(
            fitted = report.fitted,
            changed = report.changed,
            tags_removed = report.tags_removed,
            "加价规则应用完成"
        );
        Ok(report)
    }

    /// 废弃规则；已废弃的规则直接返回
    #[instrument(skip(self))]
    pub fn deprecate(&self, rule_id: i64, now: DateTime<Utc>) -> PricingResult<DeprecateReport> {
        let rule = self.load_rule(rule_id)?;
        if rule.deprecated {
            debug!("规则已处于废弃状态");
            return Ok(DeprecateReport {
                rule_id,
                already_deprecated: true,
                ..Default::default()
            });
        }

        let tags = self.repos.price_manager_repo.find_tags_by_rule(rule.id)?;
        let product_ids: Vec<i64> = tags.iter().map(|t| t.main_product_id).collect();
        let mains = self.repos.product_repo.find_main_products_by_ids(&product_ids)?;
        let owned_elsewhere = self
            .repos
            .price_manager_repo
            .find_products_tagged_by_other_rules(rule.id, rule.dest)?;

        let (tags_removed, products_cleared) = self.repos.product_repo.transaction(|tx| {
            let mut cleared = 0;
            for tag in &tags {
                let Some(main) = mains.get(&tag.main_product_id) else {
                    continue;
                };
                // 只清空仍由本规则写入的价格: 已被其他有效规则接管或改写的保持不变
                if owned_elsewhere.contains(&main.id) || main.price(rule.dest) != Some(tag.price) {
                    continue;
                }
                let mut updated = main.clone();
                updated.set_price(rule.dest, None);
                ProductRepository::update_main_price_tx(tx, updated.id, rule.dest, None, now)?;
                ProductRepository::insert_log_tx(tx, &updated.snapshot(now))?;
                cleared += 1;
            }
            let removed = PriceManagerRepository::delete_tags_by_rule_tx(tx, rule.id)?;
            PriceManagerRepository::set_deprecated_tx(tx, rule.id, now)?;
            Ok((removed, cleared))
        })?;

        info!(tags_removed, products_cleared, "加价规则已废弃");
        Ok(DeprecateReport {
            rule_id,
            tags_removed,
            products_cleared,
            already_deprecated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{MainPriceField, SupplierPriceField};

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn rule(id: i64) -> PriceManager {
        PriceManager {
            id,
            name: format!("rule-{}", id),
            supplier_id: 1,
            discount_group_ids: Vec::new(),
            category_ids: Vec::new(),
            has_rrp: None,
            price_from: None,
            price_to: None,
            date_from: None,
            date_to: None,
            source: PriceSource::Supplier(SupplierPriceField::SupplierPrice),
            fixed_price: None,
            dest: MainPriceField::BasicPrice,
            markup: Decimal::ZERO,
            increase: Decimal::ZERO,
            deprecated: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_markup_rounds_up() {
        assert_eq!(apply_markup(dec("1000"), dec("10"), dec("50")), dec("1150"));
        assert_eq!(apply_markup(dec("99.01"), Decimal::ZERO, Decimal::ZERO), dec("100"));
        assert_eq!(apply_markup(dec("200"), dec("-100"), dec("5")), dec("5"));
    }

    #[test]
    fn test_compute_price_supplier_source_uses_min_positive_and_rate() {
        let r = rule(1);
        let main = MainProduct::new(1, "A".to_string(), "Drill".to_string());
        let mut cheap = SupplierProduct::new(1, "A".to_string(), "x".to_string());
        cheap.supplier_price = Some(dec("10.2"));
        let mut zero = cheap.clone();
        zero.supplier_price = Some(Decimal::ZERO);
        let mut pricey = cheap.clone();
        pricey.supplier_price = Some(dec("12"));

        let price = compute_price(&r, &main, &[&pricey, &zero, &cheap], dec("2"));
        assert_eq!(price, Some(dec("21")));
        assert_eq!(compute_price(&r, &main, &[&zero], Decimal::ONE), None);
    }

    #[test]
    fn test_compute_price_main_and_fixed_sources() {
        let mut main = MainProduct::new(1, "A".to_string(), "Drill".to_string());
        main.prime_cost = Some(dec("1000"));

        let mut from_main = rule(1);
        from_main.source = PriceSource::Main(MainPriceField::PrimeCost);
        from_main.markup = dec("10");
        from_main.increase = dec("50");
        assert_eq!(compute_price(&from_main, &main, &[], dec("3")), Some(dec("1150")));

        let mut fixed = rule(2);
        fixed.source = PriceSource::FixedPrice;
        fixed.fixed_price = Some(dec("499.10"));
        assert_eq!(compute_price(&fixed, &main, &[], Decimal::ONE), Some(dec("500")));
    }

    #[test]
    fn test_band_overlap_cases() {
        let d = |v: &str| Some(dec(v));
        assert!(bands_overlap(d("100"), d("200"), d("150"), d("250")));
        assert!(bands_overlap(d("100"), d("200"), d("200"), d("300")));
        assert!(!bands_overlap(d("100"), d("200"), d("201"), d("300")));
        assert!(bands_overlap(None, None, d("1"), d("2")));
        assert!(bands_overlap(d("500"), None, None, d("600")));
        assert!(!bands_overlap(d("500"), None, None, d("400")));
    }

    #[test]
    fn test_rules_conflict() {
        let mut a = rule(1);
        a.price_from = Some(dec("100"));
        a.price_to = Some(dec("200"));
        let mut b = rule(2);
        b.price_from = Some(dec("150"));
        b.price_to = Some(dec("250"));
        assert!(rules_conflict(&a, &b));

        let mut other_dest = b.clone();
        other_dest.dest = MainPriceField::MPrice;
        assert!(!rules_conflict(&a, &other_dest));

        let mut disjoint_groups = b.clone();
        a.discount_group_ids = vec![1];
        disjoint_groups.discount_group_ids = vec![2];
        assert!(!rules_conflict(&a, &disjoint_groups));
        assert!(rules_conflict(&a, &b));

        let mut deprecated = b.clone();
        deprecated.deprecated = true;
        assert!(!rules_conflict(&a, &deprecated));
        assert!(!rules_conflict(&a, &a.clone()));
    }
}
