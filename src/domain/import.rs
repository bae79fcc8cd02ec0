// ==========================================
// 供应商价目表管理系统 - 导入领域模型
// ==========================================
// 职责: 导入管道中间产物与导入结果
// 生命周期: 仅在一次导入流程内
// ==========================================

use crate::domain::types::FieldKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// RawSheet - 解析后的原始表格
// ==========================================
// 空单元格以空字符串保存，由映射层统一判定为“缺失”
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl RawSheet {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// 按表头顺序追加一行
    pub fn push_row<S: AsRef<str>>(&mut self, cells: &[S]) {
        let row = self
            .headers
            .iter()
            .zip(cells.iter())
            .map(|(h, v)| (h.clone(), v.as_ref().trim().to_string()))
            .collect();
        self.rows.push(row);
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ==========================================
// MappedRow - 完成列映射的行
// ==========================================
// values 只包含非空字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRow {
    pub row_number: usize, // 原始文件行号（表头为第 1 行）
    pub values: HashMap<FieldKey, String>,
}

impl MappedRow {
    pub fn get(&self, key: FieldKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }
}

// ==========================================
// RowError - 行级错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub article: Option<String>,
    pub field: Option<String>,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.article, &self.field) {
            (Some(article), Some(field)) => write!(
                f,
                "行 {} (article={}, 字段 {}): {}",
                self.row_number, article, field, self.message
            ),
            (Some(article), None) => {
                write!(f, "行 {} (article={}): {}", self.row_number, article, self.message)
            }
            (None, Some(field)) => {
                write!(f, "行 {} (字段 {}): {}", self.row_number, field, self.message)
            }
            (None, None) => write!(f, "行 {}: {}", self.row_number, self.message),
        }
    }
}

// ==========================================
// ImportSummary - 导入汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,           // 表格数据行数
    pub dropped: usize,              // 必填字段缺失被丢弃
    pub created: usize,              // 新建供应商商品
    pub updated: usize,              // 更新供应商商品
    pub skipped: usize,              // 无匹配且不允许新建
    pub failed: usize,               // 行级错误
    pub main_created: usize,         // 新建主商品
    pub main_updated: usize,         // 更新主商品
    pub stock_refreshed: usize,      // 库存汇总发生变化的主商品
}

// ==========================================
// ImportReport - 导入结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub setting_id: i64,
    pub supplier_id: i64,
    pub summary: ImportSummary,
    pub errors: Vec<RowError>,
    pub price_columns_imported: bool,
    pub stock_column_imported: bool,
    pub elapsed_time: std::time::Duration,
}

impl ImportReport {
    /// 错误摘要（截断到前 limit 条）
    pub fn error_summary(&self, limit: usize) -> Vec<String> {
        self.errors.iter().take(limit).map(|e| e.to_string()).collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 面向用户的一句话结果
    pub fn message(&self, limit: usize) -> String {
        let s = &self.summary;
        let mut message = format!(
            "新增 {} 条，更新 {} 条，跳过 {} 条，丢弃 {} 条",
            s.created, s.updated, s.skipped, s.dropped
        );
        if self.has_errors() {
            message.push_str(&format!(
                "；失败 {} 条: {}",
                s.failed,
                self.error_summary(limit).join("; ")
            ));
        }
        message
    }

    /// 导入结果快照（JSON），随完成日志输出
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_summary_truncates() {
        let errors = (1..=8)
            .map(|i| RowError {
                row_number: i + 1,
                article: Some(format!("A{}", i)),
                field: None,
                message: "无法解析".to_string(),
            })
            .collect::<Vec<_>>();
        let report = ImportReport {
            batch_id: "b".to_string(),
            setting_id: 1,
            supplier_id: 1,
            summary: ImportSummary {
                failed: 8,
                ..Default::default()
            },
            errors,
            price_columns_imported: true,
            stock_column_imported: false,
            elapsed_time: std::time::Duration::from_millis(1),
        };

        assert_eq!(report.error_summary(5).len(), 5);
        assert!(report.message(5).contains("失败 8 条"));

        let snapshot: serde_json::Value = serde_json::from_str(&report.snapshot_json().unwrap()).unwrap();
        assert_eq!(snapshot["summary"]["failed"], 8);
        assert_eq!(snapshot["errors"].as_array().map(Vec::len), Some(8));
    }

    #[test]
    fn test_push_row_trims() {
        let mut sheet = RawSheet::new(vec!["Art".to_string(), "Name".to_string()]);
        sheet.push_row(&[" A1 ", "Drill"]);
        assert_eq!(sheet.rows[0].get("Art"), Some(&"A1".to_string()));
        assert!(sheet.has_column("Name"));
        assert_eq!(sheet.len(), 1);
    }
}
