// ==========================================
// 供应商价目表管理系统 - 规则过滤器
// ==========================================
// 职责: 把 PriceManager 的声明式条件转换为谓词列表，再折叠为一个闭包
// 候选单位: (供应商商品, 其关联的主商品)
// 价格带: 作用于 source 字段，两端均可省略，边界包含
// ==========================================

use crate::domain::price_manager::PriceManager;
use crate::domain::product::{MainProduct, SupplierProduct};
use crate::domain::types::PriceSource;
use rust_decimal::Decimal;

/// 过滤候选
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub supplier_product: &'a SupplierProduct,
    pub main_product: &'a MainProduct,
}

impl<'a> Candidate<'a> {
    pub fn new(supplier_product: &'a SupplierProduct, main_product: &'a MainProduct) -> Self {
        Self {
            supplier_product,
            main_product,
        }
    }

    /// source 字段在该候选上的原始值；固定价无来源值
    pub fn source_value(&self, source: PriceSource) -> Option<Decimal> {
        match source {
            PriceSource::Supplier(field) => self.supplier_product.price(field),
            PriceSource::Main(field) => self.main_product.price(field),
            PriceSource::FixedPrice => None,
        }
    }
}

// ==========================================
// RulePredicate - 单个过滤条件
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum RulePredicate {
    Supplier(i64),
    /// true: rrp > 0；false: rrp 为空或 0
    HasRrp(bool),
    /// 与供应商商品的折扣组有交集
    DiscountGroups(Vec<i64>),
    /// 关联主商品的品类在集合内
    Categories(Vec<i64>),
    SourceBand {
        source: PriceSource,
        from: Option<Decimal>,
        to: Option<Decimal>,
    },
}

impl RulePredicate {
    pub fn matches(&self, candidate: &Candidate<'_>) -> bool {
        match self {
            RulePredicate::Supplier(supplier_id) => {
                candidate.supplier_product.supplier_id == *supplier_id
            }
            RulePredicate::HasRrp(required) => {
                let has = candidate
                    .supplier_product
                    .rrp
                    .is_some_and(|rrp| rrp > Decimal::ZERO);
                has == *required
            }
            RulePredicate::DiscountGroups(groups) => candidate
                .supplier_product
                .discount_group_ids
                .iter()
                .any(|id| groups.contains(id)),
            RulePredicate::Categories(categories) => candidate
                .main_product
                .category_id
                .is_some_and(|id| categories.contains(&id)),
            RulePredicate::SourceBand { source, from, to } => {
                match candidate.source_value(*source) {
                    Some(value) => {
                        from.map_or(true, |from| value >= from) && to.map_or(true, |to| value <= to)
                    }
                    None => false,
                }
            }
        }
    }
}

// ==========================================
// RuleFilter - 谓词列表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    predicates: Vec<RulePredicate>,
}

impl RuleFilter {
    /// 按规则字段生成谓词；未设置的条件不产生谓词
    pub fn for_rule(rule: &PriceManager) -> Self {
        let mut predicates = vec![RulePredicate::Supplier(rule.supplier_id)];

        if let Some(required) = rule.has_rrp {
            predicates.push(RulePredicate::HasRrp(required));
        }
        if !rule.discount_group_ids.is_empty() {
            predicates.push(RulePredicate::DiscountGroups(rule.discount_group_ids.clone()));
        }
        if !rule.category_ids.is_empty() {
            predicates.push(RulePredicate::Categories(rule.category_ids.clone()));
        }
        if rule.has_price_band() && rule.source != PriceSource::FixedPrice {
            predicates.push(RulePredicate::SourceBand {
                source: rule.source,
                from: rule.price_from,
                to: rule.price_to,
            });
        }

        Self { predicates }
    }

    pub fn predicates(&self) -> &[RulePredicate] {
        &self.predicates
    }

    pub fn matches(&self, candidate: &Candidate<'_>) -> bool {
        self.predicates.iter().all(|p| p.matches(candidate))
    }

    /// 折叠为单个闭包
    pub fn into_predicate(self) -> impl Fn(&Candidate<'_>) -> bool {
        self.predicates.into_iter().fold(
            Box::new(|_: &Candidate<'_>| true) as Box<dyn Fn(&Candidate<'_>) -> bool>,
            |acc, predicate| Box::new(move |c: &Candidate<'_>| acc(c) && predicate.matches(c)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{MainPriceField, SupplierPriceField};
    use chrono::Utc;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn rule() -> PriceManager {
        PriceManager {
            id: 1,
            name: "base".to_string(),
            supplier_id: 7,
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

    fn supplier_product(price: &str, rrp: Option<&str>, groups: Vec<i64>) -> SupplierProduct {
        let mut product = SupplierProduct::new(7, "A1".to_string(), "Drill".to_string());
        product.supplier_price = Some(dec(price));
        product.rrp = rrp.map(dec);
        product.discount_group_ids = groups;
        product
    }

    fn main_product(category_id: Option<i64>) -> MainProduct {
        let mut product = MainProduct::new(7, "A1".to_string(), "Drill".to_string());
        product.id = 3;
        product.category_id = category_id;
        product
    }

    #[test]
    fn test_unrestricted_rule_only_checks_supplier() {
        let filter = RuleFilter::for_rule(&rule());
        assert_eq!(filter.predicates().len(), 1);

        let sp = supplier_product("10", None, vec![]);
        let mp = main_product(None);
        assert!(filter.matches(&Candidate::new(&sp, &mp)));

        let mut other = sp.clone();
        other.supplier_id = 8;
        assert!(!filter.matches(&Candidate::new(&other, &mp)));
    }

    #[test]
    fn test_has_rrp_tristate() {
        let mut with_rrp = rule();
        with_rrp.has_rrp = Some(true);
        let mut without_rrp = rule();
        without_rrp.has_rrp = Some(false);

        let mp = main_product(None);
        let priced = supplier_product("10", Some("15"), vec![]);
        let zero = supplier_product("10", Some("0"), vec![]);
        let missing = supplier_product("10", None, vec![]);

        let check = RuleFilter::for_rule(&with_rrp).into_predicate();
        assert!(check(&Candidate::new(&priced, &mp)));
        assert!(!check(&Candidate::new(&zero, &mp)));

        let check = RuleFilter::for_rule(&without_rrp).into_predicate();
        assert!(check(&Candidate::new(&zero, &mp)));
        assert!(check(&Candidate::new(&missing, &mp)));
        assert!(!check(&Candidate::new(&priced, &mp)));
    }

    #[test]
    fn test_groups_categories_and_band() {
        let mut scoped = rule();
        scoped.discount_group_ids = vec![1, 2];
        scoped.category_ids = vec![10];
        scoped.price_from = Some(dec("100"));
        scoped.price_to = Some(dec("200"));
        let check = RuleFilter::for_rule(&scoped).into_predicate();

        let in_category = main_product(Some(10));
        let elsewhere = main_product(Some(11));

        assert!(check(&Candidate::new(&supplier_product("100", None, vec![2]), &in_category)));
        assert!(check(&Candidate::new(&supplier_product("200", None, vec![1, 5]), &in_category)));
        assert!(!check(&Candidate::new(&supplier_product("200.01", None, vec![1]), &in_category)));
        assert!(!check(&Candidate::new(&supplier_product("150", None, vec![3]), &in_category)));
        assert!(!check(&Candidate::new(&supplier_product("150", None, vec![1]), &elsewhere)));
    }

    #[test]
    fn test_open_band_and_missing_source_value() {
        let mut open = rule();
        open.price_from = Some(dec("50"));
        let filter = RuleFilter::for_rule(&open);
        let mp = main_product(None);

        assert!(filter.matches(&Candidate::new(&supplier_product("5000", None, vec![]), &mp)));

        let mut empty = supplier_product("0", None, vec![]);
        empty.supplier_price = None;
        assert!(!filter.matches(&Candidate::new(&empty, &mp)));
    }
}
