// ==========================================
// 供应商价目表管理系统 - 商品领域模型
// ==========================================
// 职责: MainProduct（规范目录） / SupplierProduct（供应商原始报价） / MainProductLog（历史）
// 约束: 两类商品均在 (supplier, article, name) 上唯一
// ==========================================

use crate::domain::types::{MainPriceField, SupplierPriceField};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// SupplierProduct - 供应商商品
// ==========================================
// id = 0 表示尚未落库
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierProduct {
    pub id: i64,
    pub supplier_id: i64,
    pub article: String,
    pub name: String,
    pub manufacturer_id: Option<i64>,
    pub discount_group_ids: Vec<i64>,
    pub stock: Option<i64>,
    pub supplier_price: Option<Decimal>,
    pub rrp: Option<Decimal>,
    pub discount_price: Option<Decimal>,
    pub main_product_id: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SupplierProduct {
    pub fn new(supplier_id: i64, article: String, name: String) -> Self {
        Self {
            supplier_id,
            article,
            name,
            ..Default::default()
        }
    }

    pub fn price(&self, field: SupplierPriceField) -> Option<Decimal> {
        match field {
            SupplierPriceField::SupplierPrice => self.supplier_price,
            SupplierPriceField::Rrp => self.rrp,
            SupplierPriceField::DiscountPrice => self.discount_price,
        }
    }

    pub fn set_price(&mut self, field: SupplierPriceField, value: Option<Decimal>) {
        match field {
            SupplierPriceField::SupplierPrice => self.supplier_price = value,
            SupplierPriceField::Rrp => self.rrp = value,
            SupplierPriceField::DiscountPrice => self.discount_price = value,
        }
    }
}

// ==========================================
// MainProduct - 规范目录商品
// ==========================================
// 价格字段只由规则引擎或直接导入修改
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainProduct {
    pub id: i64,
    pub supplier_id: i64,
    pub article: String,
    pub name: String,
    pub sku: Option<String>,
    pub category_id: Option<i64>,
    pub manufacturer_id: Option<i64>,
    pub stock: i64,
    pub prime_cost: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub basic_price: Option<Decimal>,
    pub m_price: Option<Decimal>,
    pub wholesale_price_extra: Option<Decimal>,
    pub price_updated_at: Option<DateTime<Utc>>,
    pub stock_updated_at: Option<DateTime<Utc>>,
    pub search_vector: Option<String>,
}

impl MainProduct {
    pub fn new(supplier_id: i64, article: String, name: String) -> Self {
        Self {
            supplier_id,
            article,
            name,
            ..Default::default()
        }
    }

    pub fn price(&self, field: MainPriceField) -> Option<Decimal> {
        match field {
            MainPriceField::PrimeCost => self.prime_cost,
            MainPriceField::WholesalePrice => self.wholesale_price,
            MainPriceField::BasicPrice => self.basic_price,
            MainPriceField::MPrice => self.m_price,
            MainPriceField::WholesalePriceExtra => self.wholesale_price_extra,
        }
    }

    pub fn set_price(&mut self, field: MainPriceField, value: Option<Decimal>) {
        match field {
            MainPriceField::PrimeCost => self.prime_cost = value,
            MainPriceField::WholesalePrice => self.wholesale_price = value,
            MainPriceField::BasicPrice => self.basic_price = value,
            MainPriceField::MPrice => self.m_price = value,
            MainPriceField::WholesalePriceExtra => self.wholesale_price_extra = value,
        }
    }

    /// 重新计算全文检索向量
    pub fn refresh_search_vector(&mut self, category: Option<&str>, manufacturer: Option<&str>) {
        self.search_vector = Some(compose_search_vector(&[
            Some(self.name.as_str()),
            category,
            manufacturer,
            Some(self.article.as_str()),
            self.sku.as_deref(),
        ]));
    }

    /// 当前值快照（写入历史表）
    pub fn snapshot(&self, created_at: DateTime<Utc>) -> MainProductLog {
        MainProductLog {
            created_at,
            main_product_id: self.id,
            stock: self.stock,
            prime_cost: self.prime_cost,
            wholesale_price: self.wholesale_price,
            basic_price: self.basic_price,
            m_price: self.m_price,
            wholesale_price_extra: self.wholesale_price_extra,
        }
    }
}

/// 拼接检索词: 小写、按空白切分、去重（保序）
pub fn compose_search_vector(parts: &[Option<&str>]) -> String {
    let mut tokens: Vec<String> = Vec::new();
    for part in parts.iter().flatten() {
        for token in part.split_whitespace() {
            let token = token.to_lowercase();
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    tokens.join(" ")
}

// ==========================================
// MainProductLog - 价格/库存历史（只追加）
// ==========================================
// 主键: (created_at, main_product_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainProductLog {
    pub created_at: DateTime<Utc>,
    pub main_product_id: i64,
    pub stock: i64,
    pub prime_cost: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub basic_price: Option<Decimal>,
    pub m_price: Option<Decimal>,
    pub wholesale_price_extra: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_search_vector_dedup_and_lowercase() {
        let mut product = MainProduct::new(1, "AB-12".to_string(), "Drill Bosch GSB".to_string());
        product.sku = Some("SKU1".to_string());
        product.refresh_search_vector(Some("Tools"), Some("Bosch"));
        assert_eq!(
            product.search_vector.as_deref(),
            Some("drill bosch gsb tools ab-12 sku1")
        );
    }

    #[test]
    fn test_main_price_accessors() {
        let mut product = MainProduct::default();
        product.set_price(MainPriceField::MPrice, Some(dec("1150")));
        assert_eq!(product.price(MainPriceField::MPrice), Some(dec("1150")));
        assert_eq!(product.price(MainPriceField::BasicPrice), None);
    }
}
