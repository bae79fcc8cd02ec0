// ==========================================
// 供应商价目表管理系统 - 供应商价目表导入器实现
// ==========================================
// 职责: 整合导入流程，从表格到目录
// 流程: 解析 → 列映射 → 外键预解析 → 逐行对账 → 单事务落库 → 库存汇总
// 错误: 行级转换错误收集后继续；数据库错误整批中止
// ==========================================

use crate::config::{ImportConfigReader, ImportOptions};
use crate::domain::catalog::Category;
use crate::domain::import::{ImportReport, ImportSummary, MappedRow, RawSheet, RowError};
use crate::domain::product::{MainProduct, SupplierProduct};
use crate::domain::setting::Setting;
use crate::domain::types::{FieldKey, SupplierPriceField};
use crate::engine::catalog_sync::refresh_aggregate_stock;
use crate::engine::category_resolver::CategoryResolver;
use crate::engine::manufacturer_resolver::ManufacturerResolver;
use crate::engine::repositories::CatalogRepositories;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{ColumnMapper, MappingOutcome};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::import_trait::{FileParser, SupplierImporter};
use crate::importer::value_coercion::{CoercionError, ValueCoercer};
use crate::repository::{ProductRepository, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 商品查找键: differ_by_name 时为 (article, name)，否则 (article, "")
type ProductKey = (String, String);

fn product_key(differ_by_name: bool, article: &str, name: &str) -> ProductKey {
    if differ_by_name {
        (article.to_string(), name.to_string())
    } else {
        (article.to_string(), String::new())
    }
}

/// 折扣组单元格按逗号拆分
pub fn split_discount_groups(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

// ==========================================
// 外键预解析结果
// ==========================================
#[derive(Default)]
struct ResolvedForeignKeys {
    manufacturers: HashMap<String, i64>,
    categories: HashMap<String, Category>,
    discount_groups: HashMap<String, i64>,
}

// ==========================================
// RowValues - 单行完整转换结果
// ==========================================
// 外层 Option = 该字段未映射
#[derive(Debug, Default)]
struct RowValues {
    name: Option<String>,
    sku: Option<String>,
    manufacturer_id: Option<Option<i64>>,
    category_id: Option<i64>,
    discount_group_ids: Option<Vec<i64>>,
    stock: Option<Option<i64>>,
    prices: Vec<(SupplierPriceField, Option<Decimal>)>,
}

fn convert_row(
    row: &MappedRow,
    article: &str,
    mapped_keys: &BTreeSet<FieldKey>,
    coercer: &ValueCoercer,
    fks: &ResolvedForeignKeys,
) -> Result<RowValues, RowError> {
    let row_error = |key: FieldKey, err: CoercionError| RowError {
        row_number: row.row_number,
        article: Some(article.to_string()),
        field: Some(key.key().to_string()),
        message: err.to_string(),
    };

    let mut values = RowValues::default();
    for &key in mapped_keys {
        let raw = row.get(key);
        match key {
            FieldKey::Article => {}
            FieldKey::Name => values.name = raw.map(str::to_string),
            FieldKey::Sku => values.sku = raw.map(str::to_string),
            FieldKey::Manufacturer => {
                values.manufacturer_id = Some(raw.and_then(|v| fks.manufacturers.get(v).copied()));
            }
            FieldKey::Category => {
                values.category_id = raw.and_then(|v| fks.categories.get(v)).map(|c| c.id);
            }
            FieldKey::DiscountGroup => {
                let mut ids: Vec<i64> = raw
                    .map(|v| {
                        split_discount_groups(v)
                            .filter_map(|name| fks.discount_groups.get(name).copied())
                            .collect()
                    })
                    .unwrap_or_default();
                ids.sort_unstable();
                ids.dedup();
                values.discount_group_ids = Some(ids);
            }
            FieldKey::Stock => {
                let stock = coercer
                    .coerce(key, raw.unwrap_or(""))
                    .map_err(|e| row_error(key, e))?
                    .and_then(|v| v.as_integer());
                values.stock = Some(stock);
            }
            FieldKey::SupplierPrice | FieldKey::Rrp | FieldKey::DiscountPrice => {
                let price = coercer
                    .coerce(key, raw.unwrap_or(""))
                    .map_err(|e| row_error(key, e))?
                    .and_then(|v| v.as_decimal());
                if let Some(field) = key.price_field() {
                    values.prices.push((field, price));
                }
            }
        }
    }
    Ok(values)
}

// ==========================================
// WorkingSet - 批次内工作集
// ==========================================
// 新建商品也进入索引，同一批次的重复行更新同一商品
struct WorkingSet {
    differ_by_name: bool,
    products: Vec<SupplierProduct>,
    index: HashMap<ProductKey, usize>,
    touched: BTreeSet<usize>,
    mains: Vec<MainProduct>,
    main_index: HashMap<ProductKey, usize>,
    main_by_id: HashMap<i64, usize>,
    main_touched: BTreeSet<usize>,
    main_created: BTreeSet<usize>,
    links: HashMap<usize, usize>, // 供应商商品下标 → 主商品下标
}

impl WorkingSet {
    fn load(repo: &ProductRepository, setting: &Setting) -> RepositoryResult<Self> {
        let differ_by_name = setting.differ_by_name;
        let products = repo.find_supplier_products(setting.supplier_id)?;
        let mut index = HashMap::new();
        for (i, p) in products.iter().enumerate() {
            // 同键多条时取 id 最小者
            index
                .entry(product_key(differ_by_name, &p.article, &p.name))
                .or_insert(i);
        }

        let mains = if setting.update_main {
            repo.find_main_products(setting.supplier_id)?
        } else {
            Vec::new()
        };
        let mut main_index = HashMap::new();
        let mut main_by_id = HashMap::new();
        for (i, m) in mains.iter().enumerate() {
            main_index
                .entry(product_key(differ_by_name, &m.article, &m.name))
                .or_insert(i);
            main_by_id.insert(m.id, i);
        }

        Ok(Self {
            differ_by_name,
            products,
            index,
            touched: BTreeSet::new(),
            mains,
            main_index,
            main_by_id,
            main_touched: BTreeSet::new(),
            main_created: BTreeSet::new(),
            links: HashMap::new(),
        })
    }

    fn find(&self, article: &str, name: &str) -> Option<usize> {
        self.index
            .get(&product_key(self.differ_by_name, article, name))
            .copied()
    }

    fn insert(&mut self, product: SupplierProduct) -> usize {
        let idx = self.products.len();
        self.index.insert(
            product_key(self.differ_by_name, &product.article, &product.name),
            idx,
        );
        self.products.push(product);
        idx
    }

    /// 查找或创建主商品并建立关联
    fn link_main(&mut self, sp_idx: usize, values: &RowValues, update_content: bool) {
        let (existing, key, article, name, supplier_id, manufacturer_id) = {
            let sp = &self.products[sp_idx];
            let key = product_key(self.differ_by_name, &sp.article, &sp.name);
            let existing = sp
                .main_product_id
                .and_then(|id| self.main_by_id.get(&id).copied())
                .or_else(|| self.main_index.get(&key).copied());
            (
                existing,
                key,
                sp.article.clone(),
                sp.name.clone(),
                sp.supplier_id,
                sp.manufacturer_id,
            )
        };

        let main_idx = match existing {
            Some(mi) => {
                let main = &mut self.mains[mi];
                if update_content {
                    if let Some(name) = &values.name {
                        if !self.differ_by_name {
                            main.name = name.clone();
                        }
                    }
                    if let Some(Some(id)) = values.manufacturer_id {
                        main.manufacturer_id = Some(id);
                    }
                    if values.sku.is_some() {
                        main.sku = values.sku.clone();
                    }
                }
                if main.category_id.is_none() {
                    main.category_id = values.category_id;
                }
                mi
            }
            None => {
                let mut main = MainProduct::new(supplier_id, article, name);
                main.sku = values.sku.clone();
                main.category_id = values.category_id;
                main.manufacturer_id = manufacturer_id;
                let mi = self.mains.len();
                self.mains.push(main);
                self.main_index.insert(key, mi);
                self.main_created.insert(mi);
                mi
            }
        };
        self.main_touched.insert(main_idx);
        self.links.insert(sp_idx, main_idx);
    }
}

fn apply_values(
    product: &mut SupplierProduct,
    values: &RowValues,
    differ_by_name: bool,
    now: DateTime<Utc>,
) {
    if !differ_by_name {
        if let Some(name) = &values.name {
            product.name = name.clone();
        }
    }
    if let Some(manufacturer_id) = values.manufacturer_id {
        product.manufacturer_id = manufacturer_id;
    }
    if let Some(ids) = &values.discount_group_ids {
        product.discount_group_ids = ids.clone();
    }
    if let Some(stock) = values.stock {
        product.stock = stock;
    }
    for (field, price) in &values.prices {
        product.set_price(*field, *price);
    }
    product.updated_at = Some(now);
}

// ==========================================
// SupplierImporterImpl - 供应商价目表导入器
// ==========================================
pub struct SupplierImporterImpl<C>
where
    C: ImportConfigReader,
{
    repos: CatalogRepositories,
    config: Arc<C>,
    file_parser: Box<dyn FileParser>,
}

impl<C> SupplierImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 创建新的导入器实例（默认按扩展名选择解析器）
    pub fn new(repos: CatalogRepositories, config: Arc<C>) -> Self {
        Self {
            repos,
            config,
            file_parser: Box::new(UniversalFileParser),
        }
    }

    /// 替换文件解析器
    pub fn with_file_parser(mut self, file_parser: Box<dyn FileParser>) -> Self {
        self.file_parser = file_parser;
        self
    }

    fn load_setting(&self, setting_id: i64) -> ImportResult<Setting> {
        let setting = self
            .repos
            .setting_repo
            .find_with_links(setting_id)?
            .ok_or(ImportError::SettingNotFound(setting_id))?;
        // 供应商必须存在
        self.repos.supplier_repo.get(setting.supplier_id)?;
        Ok(setting)
    }

    fn resolve_foreign_keys(
        &self,
        setting: &Setting,
        outcome: &MappingOutcome,
        options: &ImportOptions,
    ) -> ImportResult<ResolvedForeignKeys> {
        let mut fks = ResolvedForeignKeys::default();
        let distinct = |key: FieldKey| {
            outcome
                .rows
                .iter()
                .filter_map(|r| r.get(key))
                .collect::<BTreeSet<&str>>()
        };

        if outcome.mapped_keys.contains(&FieldKey::Manufacturer) {
            let mut resolver =
                ManufacturerResolver::load(self.repos.catalog_repo.clone(), options.fuzzy_threshold)?;
            fks.manufacturers = resolver.resolve_batch(distinct(FieldKey::Manufacturer))?;
        }

        if setting.update_main && outcome.mapped_keys.contains(&FieldKey::Category) {
            let mut resolver = CategoryResolver::new(
                self.repos.catalog_repo.clone(),
                &options.category_delimiter,
                options.category_max_depth,
            );
            fks.categories = resolver.resolve_batch(distinct(FieldKey::Category))?;
        }

        if outcome.mapped_keys.contains(&FieldKey::DiscountGroup) {
            let names: BTreeSet<&str> = distinct(FieldKey::DiscountGroup)
                .into_iter()
                .flat_map(split_discount_groups)
                .collect();
            for name in names {
                let group = self
                    .repos
                    .catalog_repo
                    .get_or_create_discount_group(setting.supplier_id, name)?;
                fks.discount_groups.insert(name.to_string(), group.id);
            }
        }

        debug!(
            manufacturers = fks.manufacturers.len(),
            categories = fks.categories.len(),
            discount_groups = fks.discount_groups.len(),
            "外键预解析完成"
        );
        Ok(fks)
    }

    /// 单事务写入主商品与供应商商品，返回涉及的主商品 id
    fn persist(&self, ws: &WorkingSet) -> ImportResult<HashSet<i64>> {
        let category_names = self.repos.catalog_repo.category_names()?;
        let manufacturer_names = self.repos.catalog_repo.manufacturer_names()?;

        let main_ids = self.repos.product_repo.transaction(|tx| {
            let mut mains: Vec<MainProduct> = ws
                .main_touched
                .iter()
                .map(|&i| {
                    let mut main = ws.mains[i].clone();
                    let category = main.category_id.and_then(|id| category_names.get(&id));
                    let manufacturer = main.manufacturer_id.and_then(|id| manufacturer_names.get(&id));
                    main.refresh_search_vector(
                        category.map(String::as_str),
                        manufacturer.map(String::as_str),
                    );
                    main
                })
                .collect();
            ProductRepository::save_main_products_tx(tx, &mut mains)?;

            let saved_ids: HashMap<usize, i64> = ws
                .main_touched
                .iter()
                .copied()
                .zip(mains.iter().map(|m| m.id))
                .collect();

            let mut products: Vec<SupplierProduct> = ws
                .touched
                .iter()
                .map(|&i| {
                    let mut product = ws.products[i].clone();
                    if let Some(main_id) = ws.links.get(&i).and_then(|mi| saved_ids.get(mi)) {
                        product.main_product_id = Some(*main_id);
                    }
                    product
                })
                .collect();
            ProductRepository::save_supplier_products_tx(tx, &mut products)?;

            Ok(saved_ids.into_values().collect::<HashSet<i64>>())
        })?;
        Ok(main_ids)
    }

    #[instrument(skip(self, setting, sheet), fields(setting_id = setting.id, supplier_id = setting.supplier_id))]
    async fn reconcile(&self, setting: Setting, sheet: RawSheet) -> ImportResult<ImportReport> {
        let started = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let options = self
            .config
            .load_import_options()
            .await
            .map_err(|e| ImportError::ConfigReadError(e.to_string()))?;
        let now = Utc::now();

        // === 阶段 1: 列映射 ===
        let outcome = ColumnMapper::new(&setting).map_sheet(&sheet)?;
        let mut summary = ImportSummary {
            total_rows: sheet.len(),
            dropped: outcome.dropped,
            ..Default::default()
        };

        // === 阶段 2: 外键预解析 ===
        let fks = self.resolve_foreign_keys(&setting, &outcome, &options)?;
        let coercer = ValueCoercer::new(options.strict_numeric);

        // === 阶段 3: 逐行对账 ===
        let mut ws = WorkingSet::load(&self.repos.product_repo, &setting)?;
        let mut errors = Vec::new();
        for row in &outcome.rows {
            let Some(article) = row.get(FieldKey::Article).map(str::to_string) else {
                continue;
            };
            let values = match convert_row(row, &article, &outcome.mapped_keys, &coercer, &fks) {
                Ok(values) => values,
                Err(err) => {
                    summary.failed += 1;
                    errors.push(err);
                    continue;
                }
            };

            let name = values.name.clone().unwrap_or_default();
            let idx = match ws.find(&article, &name) {
                Some(idx) => {
                    summary.updated += 1;
                    idx
                }
                None if setting.create_new => {
                    summary.created += 1;
                    ws.insert(SupplierProduct::new(setting.supplier_id, article, name))
                }
                None => {
                    summary.skipped += 1;
                    continue;
                }
            };

            apply_values(&mut ws.products[idx], &values, ws.differ_by_name, now);
            ws.touched.insert(idx);
            if setting.update_main {
                ws.link_main(idx, &values, setting.update_main_content);
            }
        }
        summary.main_created = ws.main_created.len();
        summary.main_updated = ws.main_touched.len() - ws.main_created.len();

        // === 阶段 4: 落库 ===
        let main_ids = self.persist(&ws)?;

        // === 阶段 5: 时间戳与库存汇总 ===
        let price_columns_imported = outcome.has_price_column();
        let stock_column_imported = outcome.has_stock_column();
        self.repos.supplier_repo.touch_updated_at(
            setting.supplier_id,
            price_columns_imported,
            stock_column_imported,
            now,
        )?;
        summary.stock_refreshed =
            refresh_aggregate_stock(&self.repos.product_repo, Some(&main_ids), now)?;

        if !errors.is_empty() {
            warn!(
                failed = errors.len(),
                first = %errors[0],
                "部分行转换失败"
            );
        }

        let report = ImportReport {
            batch_id,
            setting_id: setting.id,
            supplier_id: setting.supplier_id,
            summary,
            errors,
            price_columns_imported,
            stock_column_imported,
            elapsed_time: started.elapsed(),
        };
        info!(
            batch_id = %report.batch_id,
            created = report.summary.created,
            updated = report.summary.updated,
            skipped = report.summary.skipped,
            dropped = report.summary.dropped,
            failed = report.summary.failed,
            elapsed_ms = report.elapsed_time.as_millis() as u64,
            "导入完成: {}",
            report.message(options.error_summary_limit)
        );
        match report.snapshot_json() {
            Ok(snapshot) => debug!(batch_id = %report.batch_id, snapshot = %snapshot, "导入结果快照"),
            Err(e) => warn!(batch_id = %report.batch_id, error = %e, "导入结果快照序列化失败"),
        }
        Ok(report)
    }
}

#[async_trait]
impl<C> SupplierImporter for SupplierImporterImpl<C>
where
    C: ImportConfigReader + 'static,
{
    async fn import_file(&self, setting_id: i64, file_path: &Path) -> ImportResult<ImportReport> {
        let setting = self.load_setting(setting_id)?;
        let sheet = self.file_parser.parse(file_path, &setting.sheet_name)?;
        info!(
            setting_id,
            file = %file_path.display(),
            rows = sheet.len(),
            "文件解析完成"
        );
        self.reconcile(setting, sheet).await
    }

    async fn import_sheet(&self, setting_id: i64, sheet: RawSheet) -> ImportResult<ImportReport> {
        let setting = self.load_setting(setting_id)?;
        self.reconcile(setting, sheet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_discount_groups() {
        let groups: Vec<&str> = split_discount_groups(" A, B ,,C ").collect();
        assert_eq!(groups, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_product_key_ignores_name_unless_differ() {
        assert_eq!(product_key(false, "A1", "Drill"), product_key(false, "A1", "Saw"));
        assert_ne!(product_key(true, "A1", "Drill"), product_key(true, "A1", "Saw"));
    }

    #[test]
    fn test_convert_row_strict_error_carries_field() {
        let mut row = MappedRow {
            row_number: 7,
            values: HashMap::new(),
        };
        row.values.insert(FieldKey::Article, "A1".to_string());
        row.values.insert(FieldKey::SupplierPrice, "abc".to_string());
        let keys: BTreeSet<FieldKey> = [FieldKey::Article, FieldKey::SupplierPrice].into_iter().collect();
        let fks = ResolvedForeignKeys::default();

        let err = convert_row(&row, "A1", &keys, &ValueCoercer::new(true), &fks).unwrap_err();
        assert_eq!(err.row_number, 7);
        assert_eq!(err.field.as_deref(), Some("supplier_price"));

        let values = convert_row(&row, "A1", &keys, &ValueCoercer::new(false), &fks).unwrap();
        assert_eq!(
            values.prices,
            vec![(SupplierPriceField::SupplierPrice, Some(Decimal::ZERO))]
        );
    }
}
