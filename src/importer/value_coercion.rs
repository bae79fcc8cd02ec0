// ==========================================
// 供应商价目表管理系统 - 单元格值转换
// ==========================================
// 职责: 文本单元格 → 整数 / 十进制 / 文本
// 规则:
//   - 空白（含 NBSP）全部剔除
//   - 仅有逗号时逗号为小数点；逗号与点同时出现时逗号为千分位
//   - 价格/库存负数截断为 0
//   - 空值短路为“缺失”，不参与转换
// ==========================================

use crate::domain::types::{FieldKey, ValueKind};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// 转换后的单元格值
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Integer(i64),
    Decimal(Decimal),
    Text(String),
}

impl CellValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            CellValue::Decimal(d) => Some(*d),
            CellValue::Integer(i) => Some(Decimal::from(*i)),
            CellValue::Text(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            CellValue::Decimal(d) => d.trunc().to_i64(),
            CellValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            CellValue::Integer(i) => i.to_string(),
            CellValue::Decimal(d) => d.normalize().to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

/// 严格模式下的转换失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无法将 \"{raw}\" 解析为{kind}")]
pub struct CoercionError {
    pub raw: String,
    pub kind: &'static str,
}

// ==========================================
// ValueCoercer
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCoercer {
    strict: bool,
}

impl ValueCoercer {
    /// strict = false 时无法解析的数值按 0 处理
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// 数值文本标准化后解析；失败返回 None
    pub fn parse_decimal(raw: &str) -> Option<Decimal> {
        let mut text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if text.is_empty() {
            return None;
        }
        if text.contains(',') {
            if text.contains('.') {
                text = text.replace(',', "");
            } else {
                text = text.replace(',', ".");
            }
        }
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }

    /// 十进制转换；空白返回 Ok(None)
    pub fn coerce_decimal(&self, raw: &str) -> Result<Option<Decimal>, CoercionError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        match Self::parse_decimal(raw) {
            Some(value) => Ok(Some(value)),
            None if self.strict => Err(CoercionError {
                raw: raw.to_string(),
                kind: "数值",
            }),
            None => {
                tracing::debug!(raw = %raw, "数值无法解析，按 0 处理");
                Ok(Some(Decimal::ZERO))
            }
        }
    }

    /// 整数转换；小数部分截断（"12,0" → 12）
    pub fn coerce_integer(&self, raw: &str) -> Result<Option<i64>, CoercionError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        match Self::parse_decimal(raw).and_then(|d| d.trunc().to_i64()) {
            Some(value) => Ok(Some(value)),
            None if self.strict => Err(CoercionError {
                raw: raw.to_string(),
                kind: "整数",
            }),
            None => {
                tracing::debug!(raw = %raw, "整数无法解析，按 0 处理");
                Ok(Some(0))
            }
        }
    }

    /// 按字段的目标类型转换，并对价格/库存做负数截断
    pub fn coerce(&self, key: FieldKey, raw: &str) -> Result<Option<CellValue>, CoercionError> {
        let value = match key.value_kind() {
            ValueKind::Integer => self.coerce_integer(raw)?.map(|v| {
                if key.clamps_negative() {
                    CellValue::Integer(v.max(0))
                } else {
                    CellValue::Integer(v)
                }
            }),
            ValueKind::Decimal => self.coerce_decimal(raw)?.map(|v| {
                if key.clamps_negative() && v.is_sign_negative() {
                    CellValue::Decimal(Decimal::ZERO)
                } else {
                    CellValue::Decimal(v)
                }
            }),
            ValueKind::Text => {
                let text = raw.trim();
                (!text.is_empty()).then(|| CellValue::Text(text.to_string()))
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_decimal_comma_and_spaces() {
        assert_eq!(ValueCoercer::parse_decimal("1 234,56"), Some(dec("1234.56")));
        assert_eq!(ValueCoercer::parse_decimal("1\u{a0}234,56"), Some(dec("1234.56")));
        assert_eq!(ValueCoercer::parse_decimal("1\u{202f}000"), Some(dec("1000")));
        assert_eq!(ValueCoercer::parse_decimal("1,234.50"), Some(dec("1234.5")));
        assert_eq!(ValueCoercer::parse_decimal("1.5e3"), Some(dec("1500")));
        assert_eq!(ValueCoercer::parse_decimal("n/a"), None);
    }

    #[test]
    fn test_best_effort_zero_and_strict() {
        let lenient = ValueCoercer::new(false);
        assert_eq!(lenient.coerce_decimal("abc").unwrap(), Some(Decimal::ZERO));
        assert_eq!(lenient.coerce_decimal("   ").unwrap(), None);

        let strict = ValueCoercer::new(true);
        let err = strict.coerce_decimal("abc").unwrap_err();
        assert_eq!(err.raw, "abc");
        assert_eq!(strict.coerce_integer("").unwrap(), None);
    }

    #[test]
    fn test_negative_price_and_stock_clamp() {
        let coercer = ValueCoercer::default();
        assert_eq!(
            coercer.coerce(FieldKey::SupplierPrice, "-5").unwrap(),
            Some(CellValue::Decimal(Decimal::ZERO))
        );
        assert_eq!(
            coercer.coerce(FieldKey::Stock, "-3").unwrap(),
            Some(CellValue::Integer(0))
        );
        assert_eq!(
            coercer.coerce(FieldKey::Stock, "12,0").unwrap(),
            Some(CellValue::Integer(12))
        );
    }

    #[test]
    fn test_text_passthrough() {
        let coercer = ValueCoercer::default();
        assert_eq!(
            coercer.coerce(FieldKey::Name, "  Drill 18V ").unwrap(),
            Some(CellValue::Text("Drill 18V".to_string()))
        );
        assert_eq!(coercer.coerce(FieldKey::Name, "  ").unwrap(), None);
    }
}
