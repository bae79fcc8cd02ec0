// ==========================================
// 供应商价目表管理系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls/.xlsm，calamine) / CSV (.csv)
// 输出: RawSheet（表头 trim，单元格 trim，整行空白跳过）
// ==========================================

use crate::domain::import::RawSheet;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::FileParser;
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// 允许导入的表格扩展名
pub const SPREADSHEET_EXTENSIONS: [&str; 3] = ["xls", "xlsx", "xlsm"];

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// 去掉空表头并对重复表头只保留首列；返回 (列下标, 表头)
fn usable_headers(raw: Vec<String>) -> Vec<(usize, String)> {
    let mut seen = Vec::<String>::new();
    let mut columns = Vec::new();
    for (idx, header) in raw.into_iter().enumerate() {
        let header = header.trim().to_string();
        if header.is_empty() {
            continue;
        }
        if seen.contains(&header) {
            tracing::warn!(column = %header, "表头重复，仅使用第一列");
            continue;
        }
        seen.push(header.clone());
        columns.push((idx, header));
    }
    columns
}

fn push_cells(sheet: &mut RawSheet, columns: &[(usize, String)], cells: &[String]) {
    if cells.iter().all(|c| c.trim().is_empty()) {
        return;
    }
    let row = columns
        .iter()
        .map(|(idx, _)| cells.get(*idx).map(String::as_str).unwrap_or(""))
        .collect::<Vec<_>>();
    sheet.push_row(&row);
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, file_path: &Path, _sheet_name: &str) -> ImportResult<RawSheet> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let columns = usable_headers(reader.headers()?.iter().map(str::to_string).collect());
        let mut sheet = RawSheet::new(columns.iter().map(|(_, h)| h.clone()).collect());

        for result in reader.records() {
            let record = result?;
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            push_cells(&mut sheet, &columns, &cells);
        }

        Ok(sheet)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    /// sheet_name 为空时读取第一个工作表
    fn parse(&self, file_path: &Path, sheet_name: &str) -> ImportResult<RawSheet> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if !SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;
        let sheet_names = workbook.sheet_names();
        let wanted = sheet_name.trim();
        let target = if wanted.is_empty() {
            sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?
        } else {
            sheet_names
                .iter()
                .find(|name| name.trim() == wanted)
                .cloned()
                .ok_or_else(|| ImportError::SheetNotFound(wanted.to_string()))?
        };

        let range = workbook.worksheet_range(&target)?;
        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 工作表为空".to_string()))?;

        let columns = usable_headers(header_row.iter().map(|cell| cell.to_string()).collect());
        let mut sheet = RawSheet::new(columns.iter().map(|(_, h)| h.clone()).collect());

        for data_row in rows {
            let cells: Vec<String> = data_row.iter().map(|cell| cell.to_string()).collect();
            push_cells(&mut sheet, &columns, &cells);
        }

        tracing::debug!(sheet = %target, rows = sheet.len(), "工作表读取完成");
        Ok(sheet)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse(&self, file_path: &Path, sheet_name: &str) -> ImportResult<RawSheet> {
        let ext = extension_of(file_path);
        match ext.as_str() {
            "csv" => CsvParser.parse(file_path, sheet_name),
            e if SPREADSHEET_EXTENSIONS.contains(&e) => ExcelParser.parse(file_path, sheet_name),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let file = csv_file(&[" Article ,Price", "A1, 10.5", "A2,3"]);
        let sheet = CsvParser.parse(file.path(), "").unwrap();

        assert_eq!(sheet.headers, vec!["Article".to_string(), "Price".to_string()]);
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.rows[0].get("Article"), Some(&"A1".to_string()));
        assert_eq!(sheet.rows[1].get("Price"), Some(&"3".to_string()));
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let file = csv_file(&["Article,Price", "A1,2.5", ",", "A2,3.0"]);
        let sheet = CsvParser.parse(file.path(), "").unwrap();
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn test_file_not_found() {
        let result = UniversalFileParser.parse(Path::new("non_existent.csv"), "");
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = Builder::new().suffix(".ods").tempfile().unwrap();
        let result = UniversalFileParser.parse(file.path(), "");
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }
}
