// ==========================================
// 供应商价目表管理系统 - 列映射器
// ==========================================
// 职责: 表格列 → 规范字段键（Link）
// 顺序: 空值填默认值 → Dict 整格替换 → 必填校验（不满足则丢弃整行）
// 必填: article 恒必填；differ_by_name 时 name 必填；priced_only 时已映射价格字段必填
// ==========================================

use crate::domain::import::{MappedRow, RawSheet};
use crate::domain::setting::{Link, Setting};
use crate::domain::types::FieldKey;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::{BTreeSet, HashMap};

/// 单个 Link 解析后的取值来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// 表格中存在的列
    Sheet(String),
    /// 列不存在但有默认值：合成的虚拟列（名称已去重）
    Virtual(String),
}

impl ColumnSource {
    pub fn name(&self) -> &str {
        match self {
            ColumnSource::Sheet(name) | ColumnSource::Virtual(name) => name,
        }
    }
}

/// 映射结果
#[derive(Debug, Clone, Default)]
pub struct MappingOutcome {
    pub rows: Vec<MappedRow>,
    pub dropped: usize,
    /// 实际参与映射的字段（真实列或虚拟列）
    pub mapped_keys: BTreeSet<FieldKey>,
}

impl MappingOutcome {
    pub fn has_price_column(&self) -> bool {
        self.mapped_keys.iter().any(FieldKey::is_price)
    }

    pub fn has_stock_column(&self) -> bool {
        self.mapped_keys.contains(&FieldKey::Stock)
    }
}

/// 生成与表头不冲突的虚拟列名（末尾追加 '_' 直到唯一）
pub fn virtual_column_name(base: &str, headers: &[String]) -> String {
    let mut name = base.to_string();
    while headers.iter().any(|h| h == &name) {
        name.push('_');
    }
    name
}

// ==========================================
// ColumnMapper
// ==========================================
pub struct ColumnMapper<'a> {
    setting: &'a Setting,
}

impl<'a> ColumnMapper<'a> {
    pub fn new(setting: &'a Setting) -> Self {
        Self { setting }
    }

    /// 解析每个 Link 的取值来源；既无列也无默认值的 Link 不参与映射
    pub fn resolve_sources(&self, sheet: &RawSheet) -> Vec<(&'a Link, ColumnSource)> {
        let mut headers = sheet.headers.clone();
        let mut sources = Vec::new();
        for link in &self.setting.links {
            let column = link.column.as_deref().map(str::trim).filter(|c| !c.is_empty());
            match column {
                Some(col) if sheet.has_column(col) => {
                    sources.push((link, ColumnSource::Sheet(col.to_string())));
                }
                _ if link.initial_value().is_some() => {
                    let base = column.unwrap_or(link.key.key());
                    let name = virtual_column_name(base, &headers);
                    headers.push(name.clone());
                    sources.push((link, ColumnSource::Virtual(name)));
                }
                Some(col) => {
                    tracing::warn!(
                        setting_id = self.setting.id,
                        key = %link.key,
                        column = col,
                        "映射列在表格中不存在，字段忽略"
                    );
                }
                None => {}
            }
        }
        sources
    }

    pub fn map_sheet(&self, sheet: &RawSheet) -> ImportResult<MappingOutcome> {
        let sources = self.resolve_sources(sheet);
        if !sources.iter().any(|(link, _)| link.key == FieldKey::Article) {
            return Err(ImportError::InvalidSetting(format!(
                "配置 {} 未映射 article 列",
                self.setting.id
            )));
        }

        let mut outcome = MappingOutcome {
            mapped_keys: sources.iter().map(|(link, _)| link.key).collect(),
            ..Default::default()
        };
        let required = self.required_keys(&outcome.mapped_keys);

        for (idx, row) in sheet.rows.iter().enumerate() {
            let mapped = self.map_row(idx + 2, row, &sources);
            if required.iter().all(|key| mapped.values.contains_key(key)) {
                outcome.rows.push(mapped);
            } else {
                outcome.dropped += 1;
            }
        }

        tracing::debug!(
            setting_id = self.setting.id,
            rows = outcome.rows.len(),
            dropped = outcome.dropped,
            "列映射完成"
        );
        Ok(outcome)
    }

    fn required_keys(&self, mapped: &BTreeSet<FieldKey>) -> Vec<FieldKey> {
        let mut keys = vec![FieldKey::Article];
        if self.setting.differ_by_name {
            keys.push(FieldKey::Name);
        }
        if self.setting.priced_only {
            keys.extend(mapped.iter().copied().filter(FieldKey::is_price));
        }
        keys
    }

    fn map_row(
        &self,
        row_number: usize,
        row: &HashMap<String, String>,
        sources: &[(&Link, ColumnSource)],
    ) -> MappedRow {
        let mut values = HashMap::new();
        for (link, source) in sources {
            let cell = match source {
                ColumnSource::Sheet(col) => row.get(col).map(|v| v.trim()).unwrap_or(""),
                ColumnSource::Virtual(_) => "",
            };
            let filled = if cell.is_empty() {
                link.initial_value().unwrap_or("")
            } else {
                cell
            };
            let value = link.substitute(filled).trim();
            if !value.is_empty() {
                values.insert(link.key, value.to_string());
            }
        }
        MappedRow { row_number, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::setting::DictEntry;

    fn link(key: FieldKey, column: Option<&str>, initial: Option<&str>) -> Link {
        Link {
            id: 0,
            setting_id: 1,
            key,
            column: column.map(str::to_string),
            initial: initial.map(str::to_string),
            dict: Vec::new(),
        }
    }

    fn setting(links: Vec<Link>) -> Setting {
        Setting {
            id: 1,
            name: "feed".to_string(),
            supplier_id: 1,
            sheet_name: String::new(),
            differ_by_name: false,
            priced_only: true,
            create_new: true,
            update_main: true,
            update_main_content: false,
            links,
        }
    }

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> RawSheet {
        let mut sheet = RawSheet::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            sheet.push_row(row);
        }
        sheet
    }

    #[test]
    fn test_virtual_column_suffix() {
        let headers = vec!["stock".to_string(), "stock_".to_string()];
        assert_eq!(virtual_column_name("stock", &headers), "stock__");
        assert_eq!(virtual_column_name("brand", &headers), "brand");
    }

    #[test]
    fn test_initial_fill_and_dict_substitution() {
        let mut brand = link(FieldKey::Manufacturer, Some("Brand"), Some("Noname"));
        brand.dict.push(DictEntry {
            id: 1,
            link_id: 0,
            key: "BSH".to_string(),
            value: "Bosch".to_string(),
        });
        let s = setting(vec![
            link(FieldKey::Article, Some("Art"), None),
            brand,
            link(FieldKey::Stock, Some("Qty"), Some("1")),
        ]);
        let data = sheet(&["Art", "Brand"], &[&["A1", "BSH"], &["A2", ""]]);

        let outcome = ColumnMapper::new(&s).map_sheet(&data).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].get(FieldKey::Manufacturer), Some("Bosch"));
        assert_eq!(outcome.rows[1].get(FieldKey::Manufacturer), Some("Noname"));
        // Qty 列不存在，默认值通过虚拟列生效
        assert_eq!(outcome.rows[1].get(FieldKey::Stock), Some("1"));
        assert!(outcome.has_stock_column());
        assert_eq!(outcome.rows[0].row_number, 2);
    }

    #[test]
    fn test_required_fields_drop_rows() {
        let mut s = setting(vec![
            link(FieldKey::Article, Some("Art"), None),
            link(FieldKey::Name, Some("Name"), None),
            link(FieldKey::SupplierPrice, Some("Price"), None),
        ]);
        s.differ_by_name = true;
        let data = sheet(
            &["Art", "Name", "Price"],
            &[
                &["A1", "Drill", "10"],
                &["A2", "", "10"],
                &["", "Saw", "10"],
                &["A4", "Saw", ""],
            ],
        );

        let outcome = ColumnMapper::new(&s).map_sheet(&data).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.dropped, 3);
        assert!(outcome.has_price_column());
    }

    #[test]
    fn test_missing_article_link_is_invalid() {
        let s = setting(vec![link(FieldKey::Name, Some("Name"), None)]);
        let data = sheet(&["Name"], &[&["Drill"]]);
        assert!(matches!(
            ColumnMapper::new(&s).map_sheet(&data),
            Err(ImportError::InvalidSetting(_))
        ));
    }
}
