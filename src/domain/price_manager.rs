// ==========================================
// 供应商价目表管理系统 - 加价规则领域模型
// ==========================================
// 职责: PriceManager（声明式过滤 + 公式） / PriceTag（逐商品计算快照）
// 约束: dest ≠ source；price_from < price_to；markup ∈ [-100, 100]
// 状态: 仅 active → deprecated 单向迁移
// ==========================================

use crate::domain::types::{MainPriceField, PriceSource};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// PriceManager - 加价规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceManager {
    pub id: i64,
    pub name: String,
    pub supplier_id: i64,
    pub discount_group_ids: Vec<i64>, // 空 = 不限折扣组
    pub category_ids: Vec<i64>,       // 空 = 不限品类
    pub has_rrp: Option<bool>,        // 三态: None 不限 / Some(true) 需 rrp>0 / Some(false) 需无 rrp
    pub price_from: Option<Decimal>,  // 作用于 source 字段的价格带下限（含）
    pub price_to: Option<Decimal>,    // 价格带上限（含）
    pub date_from: Option<NaiveDate>, // 有效期起（含）
    pub date_to: Option<NaiveDate>,   // 有效期止（含），过期后规则被废弃
    pub source: PriceSource,
    pub fixed_price: Option<Decimal>, // 仅 source = FixedPrice 时使用
    pub dest: MainPriceField,
    pub markup: Decimal,              // 百分比
    pub increase: Decimal,            // 加价后叠加的固定金额
    pub deprecated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PriceManager {
    /// 在指定日期是否处于有效期内
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        if self.deprecated {
            return false;
        }
        let started = self.date_from.map_or(true, |from| from <= today);
        started && !self.is_expired_on(today)
    }

    /// 有效期已过（date_to 早于今天）
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.date_to.is_some_and(|to| to < today)
    }

    /// 规则是否限定了价格带
    pub fn has_price_band(&self) -> bool {
        self.price_from.is_some() || self.price_to.is_some()
    }
}

// ==========================================
// PriceManagerDraft - 规则创建/更新载荷
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceManagerDraft {
    pub name: String,
    pub supplier_id: i64,
    #[serde(default)]
    pub discount_group_ids: Vec<i64>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    pub has_rrp: Option<bool>,
    pub price_from: Option<Decimal>,
    pub price_to: Option<Decimal>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub source: Option<PriceSource>,
    pub fixed_price: Option<Decimal>,
    pub dest: MainPriceField,
    #[serde(default)]
    pub markup: Decimal,
    #[serde(default)]
    pub increase: Decimal,
}

impl PriceManagerDraft {
    /// 生成规则实体（调用方需先完成校验）
    pub fn into_rule(self, id: i64, source: PriceSource, now: DateTime<Utc>) -> PriceManager {
        PriceManager {
            id,
            name: self.name.trim().to_string(),
            supplier_id: self.supplier_id,
            discount_group_ids: self.discount_group_ids,
            category_ids: self.category_ids,
            has_rrp: self.has_rrp,
            price_from: self.price_from,
            price_to: self.price_to,
            date_from: self.date_from,
            date_to: self.date_to,
            source,
            fixed_price: self.fixed_price,
            dest: self.dest,
            markup: self.markup,
            increase: self.increase,
            deprecated: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// PriceTag - 规则计算快照
// ==========================================
// 唯一键: (main_product_id, price_manager_id, dest)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTag {
    pub main_product_id: i64,
    pub price_manager_id: i64,
    pub dest: MainPriceField,
    pub source: PriceSource,
    pub markup: Decimal,
    pub increase: Decimal,
    pub fixed_price: Option<Decimal>,
    pub price: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl PriceTag {
    pub fn for_rule(rule: &PriceManager, main_product_id: i64, price: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            main_product_id,
            price_manager_id: rule.id,
            dest: rule.dest,
            source: rule.source,
            markup: rule.markup,
            increase: rule.increase,
            fixed_price: rule.fixed_price,
            price,
            updated_at: now,
        }
    }
}
