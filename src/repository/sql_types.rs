// ==========================================
// 供应商价目表管理系统 - SQL 值转换
// ==========================================
// 金额: TEXT <-> rust_decimal::Decimal
// 时间: TEXT(RFC 3339) <-> DateTime<Utc>；日期: TEXT(YYYY-MM-DD) <-> NaiveDate
// ==========================================

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use std::str::FromStr;

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn decimal_to_sql(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

pub fn datetime_to_sql(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn opt_datetime_to_sql(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(datetime_to_sql)
}

pub fn date_to_sql(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn opt_decimal(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(s.trim()).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub fn decimal(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    Ok(opt_decimal(row, idx)?.unwrap_or(Decimal::ZERO))
}

pub fn opt_datetime(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

pub fn datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub fn opt_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// 逗号分隔的整数列表（GROUP_CONCAT 结果）
pub fn id_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<i64>> {
    let raw: Option<String> = row.get(idx)?;
    let mut ids = Vec::new();
    for part in raw.unwrap_or_default().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        ids.push(part.parse::<i64>().map_err(|e| conversion_error(idx, e))?);
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_is_normalized() {
        let value: Decimal = "1150.00".parse().unwrap();
        assert_eq!(decimal_to_sql(Some(value)), Some("1150".to_string()));
        assert_eq!(decimal_to_sql(None), None);
    }

    #[test]
    fn test_datetime_roundtrip_keeps_micros() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let now = Utc::now();
        let text = datetime_to_sql(now);
        let parsed = conn
            .query_row("SELECT ?1", [&text], |row| datetime(row, 0))
            .unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
