// ==========================================
// 供应商价目表管理系统 - 加价规则校验器
// ==========================================
// 职责: 在计算与落库之前拒绝非法规则
// 校验项:
//   - 名称非空
//   - source 必填（仅给出 fixed_price 时视为固定价）；固定价规则必须给出 fixed_price
//   - source ≠ dest
//   - price_to ≠ 0；price_from < price_to
//   - markup ∈ [-100, 100]
//   - date_from ≤ date_to
// ==========================================

use crate::api::error::{ApiError, ApiResult, ValidationViolation};
use crate::domain::price_manager::PriceManagerDraft;
use crate::domain::types::PriceSource;
use rust_decimal::Decimal;

/// 加价规则校验器
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceManagerValidator;

impl PriceManagerValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验规则草稿，返回最终生效的 source
    ///
    /// # 返回
    /// - Ok(PriceSource): 校验通过
    /// - Err(ApiError::ValidationError): 携带全部违规项
    pub fn validate(&self, draft: &PriceManagerDraft) -> ApiResult<PriceSource> {
        let mut violations = Vec::new();

        if draft.name.trim().is_empty() {
            violations.push(ValidationViolation::new("name", "规则名称不能为空"));
        }

        let source = match (draft.source, draft.fixed_price) {
            (Some(source), _) => Some(source),
            (None, Some(_)) => Some(PriceSource::FixedPrice),
            (None, None) => {
                violations.push(ValidationViolation::new("source", "必须指定价格来源或固定价"));
                None
            }
        };

        if let Some(source) = source {
            if source == PriceSource::FixedPrice {
                match draft.fixed_price {
                    None => violations.push(ValidationViolation::new(
                        "fixed_price",
                        "固定价规则必须给出 fixed_price",
                    )),
                    Some(price) if price < Decimal::ZERO => violations.push(
                        ValidationViolation::new("fixed_price", "固定价不能为负数"),
                    ),
                    Some(_) => {}
                }
            }
            if source.is_same_as(draft.dest) {
                violations.push(ValidationViolation::new(
                    "dest",
                    format!("目标字段不能与来源相同: {}", draft.dest.column()),
                ));
            }
        }

        if draft.price_to == Some(Decimal::ZERO) {
            violations.push(ValidationViolation::new("price_to", "价格带上限不能为 0"));
        }
        if let (Some(from), Some(to)) = (draft.price_from, draft.price_to) {
            if from >= to {
                violations.push(ValidationViolation::new(
                    "price_from",
                    format!("价格带下限 {} 必须小于上限 {}", from, to),
                ));
            }
        }

        if draft.markup < -Decimal::ONE_HUNDRED || draft.markup > Decimal::ONE_HUNDRED {
            violations.push(ValidationViolation::new(
                "markup",
                format!("加价百分比 {} 超出 [-100, 100]", draft.markup),
            ));
        }

        if let (Some(from), Some(to)) = (draft.date_from, draft.date_to) {
            if from > to {
                violations.push(ValidationViolation::new(
                    "date_from",
                    format!("生效日期 {} 晚于失效日期 {}", from, to),
                ));
            }
        }

        match source {
            Some(source) if violations.is_empty() => Ok(source),
            _ => Err(ApiError::ValidationError {
                reason: format!("{}项规则校验未通过", violations.len()),
                violations,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{MainPriceField, SupplierPriceField};
    use chrono::NaiveDate;

    fn draft() -> PriceManagerDraft {
        PriceManagerDraft {
            name: "Bosch retail".to_string(),
            supplier_id: 1,
            discount_group_ids: Vec::new(),
            category_ids: Vec::new(),
            has_rrp: None,
            price_from: None,
            price_to: None,
            date_from: None,
            date_to: None,
            source: Some(PriceSource::Supplier(SupplierPriceField::SupplierPrice)),
            fixed_price: None,
            dest: MainPriceField::BasicPrice,
            markup: Decimal::from(10),
            increase: Decimal::from(50),
        }
    }

    fn violated_fields(result: ApiResult<PriceSource>) -> Vec<String> {
        match result {
            Err(ApiError::ValidationError { violations, .. }) => {
                violations.into_iter().map(|v| v.field).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        let source = PriceManagerValidator::new().validate(&draft()).unwrap();
        assert_eq!(source, PriceSource::Supplier(SupplierPriceField::SupplierPrice));
    }

    #[test]
    fn test_source_equals_dest_rejected() {
        let mut d = draft();
        d.source = Some(PriceSource::Main(MainPriceField::BasicPrice));
        assert_eq!(violated_fields(PriceManagerValidator.validate(&d)), vec!["dest"]);
    }

    #[test]
    fn test_band_rules() {
        let mut d = draft();
        d.price_from = Some(Decimal::from(200));
        d.price_to = Some(Decimal::from(100));
        assert_eq!(violated_fields(PriceManagerValidator.validate(&d)), vec!["price_from"]);

        d.price_from = None;
        d.price_to = Some(Decimal::ZERO);
        assert_eq!(violated_fields(PriceManagerValidator.validate(&d)), vec!["price_to"]);
    }

    #[test]
    fn test_fixed_price_rules() {
        let mut d = draft();
        d.source = None;
        d.fixed_price = Some(Decimal::from(999));
        assert_eq!(PriceManagerValidator.validate(&d).unwrap(), PriceSource::FixedPrice);

        d.fixed_price = None;
        assert_eq!(violated_fields(PriceManagerValidator.validate(&d)), vec!["source"]);

        d.source = Some(PriceSource::FixedPrice);
        assert_eq!(violated_fields(PriceManagerValidator.validate(&d)), vec!["fixed_price"]);
    }

    #[test]
    fn test_markup_and_dates() {
        let mut d = draft();
        d.markup = Decimal::from(101);
        d.date_from = NaiveDate::from_ymd_opt(2026, 5, 2);
        d.date_to = NaiveDate::from_ymd_opt(2026, 5, 1);
        assert_eq!(
            violated_fields(PriceManagerValidator.validate(&d)),
            vec!["markup", "date_from"]
        );
    }
}
