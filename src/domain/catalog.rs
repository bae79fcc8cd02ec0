// ==========================================
// 供应商价目表管理系统 - 目录领域模型
// ==========================================
// 职责: 供应商 / 厂商 / 厂商别名 / 品类树 / 折扣组
// ==========================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 品类路径的规范分隔符（物化路径使用）
pub const CATEGORY_PATH_SEPARATOR: &str = " > ";

// ==========================================
// Supplier - 供应商
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub currency_rate: Decimal,                   // 汇率乘数（供应商币种 → 本币）
    pub price_updated_at: Option<DateTime<Utc>>, // 最近一次价格导入时间
    pub stock_updated_at: Option<DateTime<Utc>>, // 最近一次库存导入时间
}

// ==========================================
// Manufacturer - 规范厂商
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: i64,
    pub name: String,
}

// ==========================================
// ManufacturerAlias - 厂商别名字典 (ManufacturerDict)
// ==========================================
// 自学习: 模糊命中后写入，之后同名直接精确命中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerAlias {
    pub id: i64,
    pub alias: String,
    pub manufacturer_id: i64,
}

// ==========================================
// Category - 品类节点（自引用树 + 物化路径）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub path: String, // 根到本节点的完整路径，以 CATEGORY_PATH_SEPARATOR 连接
    pub depth: i32,   // 根节点为 1
}

impl Category {
    /// 祖先路径（不含自身），由近及远
    pub fn ancestor_paths(&self) -> Vec<String> {
        let segments: Vec<&str> = self.path.split(CATEGORY_PATH_SEPARATOR).collect();
        (1..segments.len())
            .rev()
            .map(|end| segments[..end].join(CATEGORY_PATH_SEPARATOR))
            .collect()
    }
}

// ==========================================
// DiscountGroup - 供应商折扣组
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountGroup {
    pub id: i64,
    pub supplier_id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ancestor_paths() {
        let category = Category {
            id: 3,
            name: "C".to_string(),
            parent_id: Some(2),
            path: "A > B > C".to_string(),
            depth: 3,
        };
        assert_eq!(category.ancestor_paths(), vec!["A > B".to_string(), "A".to_string()]);
    }
}
