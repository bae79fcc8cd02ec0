// ==========================================
// 供应商价目表管理系统 - 导入 Trait
// ==========================================
// 职责: 定义导入接口（不包含实现）
// ==========================================

use crate::domain::import::{ImportReport, RawSheet};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// SupplierImporter Trait
// ==========================================
// 用途: 供应商价目表导入主接口
// 实现者: SupplierImporterImpl
#[async_trait]
pub trait SupplierImporter: Send + Sync {
    /// 按导入配置读取文件并对账入库
    ///
    /// # 参数
    /// - setting_id: 导入配置（决定供应商、工作表、列映射）
    /// - file_path: .xls/.xlsx/.xlsm/.csv 文件
    ///
    /// # 返回
    /// - Ok(ImportReport): 汇总计数 + 行级错误
    /// - Err: 文件、配置或数据库错误（整批中止）
    ///
    /// # 流程
    /// 1. 文件解析（按 Setting.sheet_name 选表）
    /// 2. 列映射（默认值 → 字典替换 → 必填校验）
    /// 3. 外键批量预解析（厂商 / 品类 / 折扣组）
    /// 4. 逐行对账（查找或新建 SupplierProduct / MainProduct）
    /// 5. 单事务落库
    /// 6. 供应商时间戳与主商品库存汇总刷新
    async fn import_file(&self, setting_id: i64, file_path: &Path) -> ImportResult<ImportReport>;

    /// 对已解析的表格执行对账（跳过文件解析阶段）
    async fn import_sheet(&self, setting_id: i64, sheet: RawSheet) -> ImportResult<ImportReport>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析文件为 RawSheet
    ///
    /// # 参数
    /// - file_path: 文件路径
    /// - sheet_name: 工作表名；为空时取第一个（CSV 忽略）
    fn parse(&self, file_path: &Path, sheet_name: &str) -> ImportResult<RawSheet>;
}
