// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================
#![allow(dead_code)]

use price_list_manager::config::ConfigManager;
use price_list_manager::db::{init_schema, open_sqlite_connection};
use price_list_manager::domain::price_manager::PriceManagerDraft;
use price_list_manager::domain::product::{MainProduct, SupplierProduct};
use price_list_manager::domain::setting::{DictEntry, Link, Setting};
use price_list_manager::domain::types::{FieldKey, MainPriceField, PriceSource, SupplierPriceField};
use price_list_manager::engine::CatalogRepositories;
use price_list_manager::importer::SupplierImporterImpl;
use price_list_manager::repository::ProductRepository;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::{Builder, NamedTempFile};

/// 测试上下文: 临时库文件需要保持存活
pub struct TestContext {
    pub _db_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub repos: CatalogRepositories,
    pub config: Arc<ConfigManager>,
}

impl TestContext {
    pub fn importer(&self) -> SupplierImporterImpl<ConfigManager> {
        SupplierImporterImpl::new(self.repos.clone(), self.config.clone())
    }
}

/// 创建临时测试数据库并初始化 schema
pub fn create_test_db() -> Result<TestContext, Box<dyn Error>> {
    let db_file = Builder::new().suffix(".db").tempfile()?;
    let db_path = db_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let repos = CatalogRepositories::from_connection(conn.clone());
    let config = Arc::new(ConfigManager::from_connection(conn.clone()).map_err(|e| e.to_string())?);

    Ok(TestContext {
        _db_file: db_file,
        db_path,
        conn,
        repos,
        config,
    })
}

pub fn dec(value: &str) -> Decimal {
    value.parse().unwrap()
}

/// 写入临时 CSV 文件
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

// ==========================================
// 导入配置
// ==========================================

pub fn link(key: FieldKey, column: Option<&str>, initial: Option<&str>) -> Link {
    Link {
        id: 0,
        setting_id: 0,
        key,
        column: column.map(str::to_string),
        initial: initial.map(str::to_string),
        dict: Vec::new(),
    }
}

pub fn with_dict(mut link: Link, pairs: &[(&str, &str)]) -> Link {
    link.dict = pairs
        .iter()
        .map(|(key, value)| DictEntry {
            id: 0,
            link_id: 0,
            key: key.to_string(),
            value: value.to_string(),
        })
        .collect();
    link
}

/// 默认: 按 article 区分、允许新建、同步主目录
pub fn setting(supplier_id: i64, links: Vec<Link>) -> Setting {
    Setting {
        id: 0,
        name: "feed".to_string(),
        supplier_id,
        sheet_name: String::new(),
        differ_by_name: false,
        priced_only: false,
        create_new: true,
        update_main: true,
        update_main_content: false,
        links,
    }
}

/// 保存配置及其 Link/Dict，返回 setting id
pub fn save_setting(repos: &CatalogRepositories, setting: &Setting) -> i64 {
    let saved = repos.setting_repo.create_setting(setting).unwrap();
    for link in &setting.links {
        let stored = repos
            .setting_repo
            .upsert_link(saved.id, link.key, link.column.as_deref(), link.initial.as_deref())
            .unwrap();
        for entry in &link.dict {
            repos
                .setting_repo
                .add_dict_entry(stored.id, &entry.key, &entry.value)
                .unwrap();
        }
    }
    saved.id
}

// ==========================================
// 商品数据
// ==========================================

/// 直接写入一组 主商品 + 供应商商品（一一关联），返回主商品 id
pub fn seed_linked_product(
    repos: &CatalogRepositories,
    supplier_id: i64,
    article: &str,
    supplier_price: Option<&str>,
    rrp: Option<&str>,
    discount_group_ids: Vec<i64>,
    category_id: Option<i64>,
) -> i64 {
    repos
        .product_repo
        .transaction(|tx| {
            let mut mains = vec![MainProduct {
                category_id,
                ..MainProduct::new(supplier_id, article.to_string(), format!("Product {}", article))
            }];
            ProductRepository::save_main_products_tx(tx, &mut mains)?;

            let mut row = SupplierProduct::new(supplier_id, article.to_string(), format!("Product {}", article));
            row.supplier_price = supplier_price.map(dec);
            row.rrp = rrp.map(dec);
            row.discount_group_ids = discount_group_ids;
            row.main_product_id = Some(mains[0].id);
            ProductRepository::save_supplier_products_tx(tx, &mut [row])?;
            Ok(mains[0].id)
        })
        .unwrap()
}

/// 基础规则草稿: supplier_price → basic_price，无过滤条件
pub fn draft(name: &str, supplier_id: i64) -> PriceManagerDraft {
    PriceManagerDraft {
        name: name.to_string(),
        supplier_id,
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
        markup: Decimal::ZERO,
        increase: Decimal::ZERO,
    }
}
