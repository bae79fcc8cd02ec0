// ==========================================
// 供应商价目表管理系统 - 领域类型定义
// ==========================================
// 职责: 静态字段清单（价格字段 / 规范字段键 / 价格来源）
// 红线: 不做运行时字段反射，所有字段名在此集中声明
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 主商品价格字段 (MainProduct price field)
// ==========================================
// 规则引擎的 dest 字段只能是其中之一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainPriceField {
    PrimeCost,           // 成本价
    WholesalePrice,      // 批发价
    BasicPrice,          // 基础价
    MPrice,              // 市场价
    WholesalePriceExtra, // 批发价（附加）
}

impl MainPriceField {
    pub const ALL: [MainPriceField; 5] = [
        MainPriceField::PrimeCost,
        MainPriceField::WholesalePrice,
        MainPriceField::BasicPrice,
        MainPriceField::MPrice,
        MainPriceField::WholesalePriceExtra,
    ];

    /// 数据库列名
    pub fn column(&self) -> &'static str {
        match self {
            MainPriceField::PrimeCost => "prime_cost",
            MainPriceField::WholesalePrice => "wholesale_price",
            MainPriceField::BasicPrice => "basic_price",
            MainPriceField::MPrice => "m_price",
            MainPriceField::WholesalePriceExtra => "wholesale_price_extra",
        }
    }

    pub fn from_column(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == value)
    }
}

impl fmt::Display for MainPriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

// ==========================================
// 供应商价格字段 (SupplierProduct price field)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierPriceField {
    SupplierPrice, // 供货价
    Rrp,           // 建议零售价
    DiscountPrice, // 折扣价
}

impl SupplierPriceField {
    pub const ALL: [SupplierPriceField; 3] = [
        SupplierPriceField::SupplierPrice,
        SupplierPriceField::Rrp,
        SupplierPriceField::DiscountPrice,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            SupplierPriceField::SupplierPrice => "supplier_price",
            SupplierPriceField::Rrp => "rrp",
            SupplierPriceField::DiscountPrice => "discount_price",
        }
    }

    pub fn from_column(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == value)
    }
}

impl fmt::Display for SupplierPriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

// ==========================================
// 价格来源 (Price source)
// ==========================================
// 供应商侧字段 / 主商品侧字段 / 固定价哨兵
// 数据库与序列化格式: 列名字符串，固定价为 "fixed_price"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PriceSource {
    Supplier(SupplierPriceField),
    Main(MainPriceField),
    FixedPrice,
}

pub const FIXED_PRICE_SOURCE: &str = "fixed_price";

impl PriceSource {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PriceSource::Supplier(field) => field.column(),
            PriceSource::Main(field) => field.column(),
            PriceSource::FixedPrice => FIXED_PRICE_SOURCE,
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        let value = value.trim();
        if value == FIXED_PRICE_SOURCE {
            return Some(PriceSource::FixedPrice);
        }
        SupplierPriceField::from_column(value)
            .map(PriceSource::Supplier)
            .or_else(|| MainPriceField::from_column(value).map(PriceSource::Main))
    }

    /// 来源与目标是否为同一字段
    pub fn is_same_as(&self, dest: MainPriceField) -> bool {
        matches!(self, PriceSource::Main(field) if *field == dest)
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl From<PriceSource> for String {
    fn from(value: PriceSource) -> Self {
        value.to_db_str().to_string()
    }
}

impl TryFrom<String> for PriceSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PriceSource::from_db_str(&value).ok_or_else(|| format!("未知价格来源: {}", value))
    }
}

// ==========================================
// 单元格目标类型 (Value kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    Decimal,
    Text,
}

// ==========================================
// 规范字段键 (Canonical field key)
// ==========================================
// Link.key 的取值范围，导入时表头被重命名为这些键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Article,
    Name,
    Sku,
    Category,
    Manufacturer,
    DiscountGroup,
    Stock,
    SupplierPrice,
    Rrp,
    DiscountPrice,
}

impl FieldKey {
    pub const ALL: [FieldKey; 10] = [
        FieldKey::Article,
        FieldKey::Name,
        FieldKey::Sku,
        FieldKey::Category,
        FieldKey::Manufacturer,
        FieldKey::DiscountGroup,
        FieldKey::Stock,
        FieldKey::SupplierPrice,
        FieldKey::Rrp,
        FieldKey::DiscountPrice,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FieldKey::Article => "article",
            FieldKey::Name => "name",
            FieldKey::Sku => "sku",
            FieldKey::Category => "category",
            FieldKey::Manufacturer => "manufacturer",
            FieldKey::DiscountGroup => "discount_group",
            FieldKey::Stock => "stock",
            FieldKey::SupplierPrice => "supplier_price",
            FieldKey::Rrp => "rrp",
            FieldKey::DiscountPrice => "discount_price",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == value.trim())
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldKey::Stock => ValueKind::Integer,
            FieldKey::SupplierPrice | FieldKey::Rrp | FieldKey::DiscountPrice => ValueKind::Decimal,
            _ => ValueKind::Text,
        }
    }

    /// 对应的供应商价格字段
    pub fn price_field(&self) -> Option<SupplierPriceField> {
        match self {
            FieldKey::SupplierPrice => Some(SupplierPriceField::SupplierPrice),
            FieldKey::Rrp => Some(SupplierPriceField::Rrp),
            FieldKey::DiscountPrice => Some(SupplierPriceField::DiscountPrice),
            _ => None,
        }
    }

    pub fn is_price(&self) -> bool {
        self.price_field().is_some()
    }

    /// 外键字段（需要批量预解析）
    pub fn is_foreign_key(&self) -> bool {
        matches!(
            self,
            FieldKey::Category | FieldKey::Manufacturer | FieldKey::DiscountGroup
        )
    }

    /// 负数视为无效并截断为 0 的字段（价格 / 库存）
    pub fn clamps_negative(&self) -> bool {
        self.is_price() || *self == FieldKey::Stock
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_source_db_roundtrip() {
        for field in MainPriceField::ALL {
            let source = PriceSource::Main(field);
            assert_eq!(PriceSource::from_db_str(source.to_db_str()), Some(source));
        }
        assert_eq!(
            PriceSource::from_db_str("rrp"),
            Some(PriceSource::Supplier(SupplierPriceField::Rrp))
        );
        assert_eq!(PriceSource::from_db_str("fixed_price"), Some(PriceSource::FixedPrice));
        assert_eq!(PriceSource::from_db_str("unknown"), None);
    }

    #[test]
    fn test_price_source_same_as_dest() {
        assert!(PriceSource::Main(MainPriceField::MPrice).is_same_as(MainPriceField::MPrice));
        assert!(!PriceSource::Main(MainPriceField::BasicPrice).is_same_as(MainPriceField::MPrice));
        assert!(!PriceSource::FixedPrice.is_same_as(MainPriceField::MPrice));
    }

    #[test]
    fn test_field_key_kinds() {
        assert_eq!(FieldKey::Stock.value_kind(), ValueKind::Integer);
        assert_eq!(FieldKey::Rrp.value_kind(), ValueKind::Decimal);
        assert_eq!(FieldKey::Name.value_kind(), ValueKind::Text);
        assert!(FieldKey::Stock.clamps_negative());
        assert!(!FieldKey::Article.clamps_negative());
        assert_eq!(FieldKey::from_key(" discount_group "), Some(FieldKey::DiscountGroup));
    }
}
