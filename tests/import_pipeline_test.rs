// ==========================================
// 价目表导入流程集成测试
// ==========================================
// 测试目标: CSV → 列映射 → 外键解析 → 对账 → 落库 → 库存汇总
// ==========================================

mod test_helpers;

use price_list_manager::config::config_keys;
use price_list_manager::domain::types::FieldKey;
use price_list_manager::importer::{ImportError, SupplierImporter};
use price_list_manager::logging;
use rust_decimal::Decimal;
use std::path::Path;
use test_helpers::{create_test_db, dec, link, save_setting, setting, with_dict, write_csv};

fn full_links() -> Vec<price_list_manager::domain::setting::Link> {
    vec![
        link(FieldKey::Article, Some("Art"), None),
        link(FieldKey::Name, Some("Title"), None),
        link(FieldKey::SupplierPrice, Some("Price"), None),
        link(FieldKey::Stock, Some("Qty"), None),
        link(FieldKey::Manufacturer, Some("Brand"), None),
        link(FieldKey::Category, Some("Cat"), None),
    ]
}

#[tokio::test]
async fn test_import_creates_products_and_catalog() {
    logging::init_test();
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let setting_id = save_setting(&ctx.repos, &setting(supplier.id, full_links()));

    let file = write_csv(&[
        "Art,Title,Price,Qty,Brand,Cat",
        "A1,Drill,\"1 234,56\",5,Bosch,Tools > Power",
        "A2,Saw,-5,-3,bosch,Tools > Hand",
        ",Nameless,10,1,Bosch,Tools",
    ]);

    let report = ctx.importer().import_file(setting_id, file.path()).await.unwrap();

    assert_eq!(report.summary.total_rows, 3);
    assert_eq!(report.summary.dropped, 1);
    assert_eq!(report.summary.created, 2);
    assert_eq!(report.summary.main_created, 2);
    assert!(report.errors.is_empty());
    assert!(report.price_columns_imported);
    assert!(report.stock_column_imported);

    let product_repo = &ctx.repos.product_repo;
    let drill = product_repo
        .find_supplier_product(supplier.id, "A1", "Drill")
        .unwrap()
        .unwrap();
    assert_eq!(drill.supplier_price, Some(dec("1234.56")));
    assert_eq!(drill.stock, Some(5));

    let saw = product_repo
        .find_supplier_product(supplier.id, "A2", "Saw")
        .unwrap()
        .unwrap();
    assert_eq!(saw.supplier_price, Some(Decimal::ZERO));
    assert_eq!(saw.stock, Some(0));

    // Bosch / bosch 解析为同一厂商
    let manufacturers = ctx.repos.catalog_repo.list_manufacturers().unwrap();
    assert_eq!(manufacturers.len(), 1);
    assert_eq!(drill.manufacturer_id, Some(manufacturers[0].id));
    assert_eq!(saw.manufacturer_id, drill.manufacturer_id);

    // Tools / Power / Hand，公共前缀复用
    assert_eq!(ctx.repos.catalog_repo.count_categories().unwrap(), 3);

    let mains = product_repo.find_main_products(supplier.id).unwrap();
    assert_eq!(mains.len(), 2);
    let main_drill = mains.iter().find(|m| m.article == "A1").unwrap();
    assert_eq!(Some(main_drill.id), drill.main_product_id);
    assert_eq!(main_drill.stock, 5);
    let vector = main_drill.search_vector.as_deref().unwrap();
    assert!(vector.contains("drill"));
    assert!(vector.contains("power"));
    assert!(vector.contains("bosch"));

    let supplier = ctx.repos.supplier_repo.get(supplier.id).unwrap();
    assert!(supplier.price_updated_at.is_some());
    assert!(supplier.stock_updated_at.is_some());
}

#[tokio::test]
async fn test_reimport_updates_in_place() {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let setting_id = save_setting(&ctx.repos, &setting(supplier.id, full_links()));
    let importer = ctx.importer();

    let first = write_csv(&["Art,Title,Price,Qty,Brand,Cat", "A1,Drill,10,4,Bosch,Tools"]);
    let report = importer.import_file(setting_id, first.path()).await.unwrap();
    assert_eq!(report.summary.created, 1);
    assert_eq!(report.summary.stock_refreshed, 1);

    let second = write_csv(&["Art,Title,Price,Qty,Brand,Cat", "A1,Drill Pro,12,4,Bosch,Tools"]);
    let report = importer.import_file(setting_id, second.path()).await.unwrap();
    assert_eq!(report.summary.created, 0);
    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.main_updated, 1);
    assert_eq!(report.summary.stock_refreshed, 0);

    assert_eq!(ctx.repos.product_repo.count_supplier_products(supplier.id).unwrap(), 1);
    let product = ctx
        .repos
        .product_repo
        .find_supplier_product(supplier.id, "A1", "Drill Pro")
        .unwrap()
        .unwrap();
    assert_eq!(product.supplier_price, Some(dec("12")));
}

#[tokio::test]
async fn test_differ_by_name_drops_blank_names() {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let mut config = setting(
        supplier.id,
        vec![
            link(FieldKey::Article, Some("Art"), None),
            link(FieldKey::Name, Some("Title"), None),
            link(FieldKey::SupplierPrice, Some("Price"), None),
        ],
    );
    config.differ_by_name = true;
    let setting_id = save_setting(&ctx.repos, &config);

    let file = write_csv(&["Art,Title,Price", "A1,Drill,10", "A1,,12", "A1,Drill XL,11"]);
    let report = ctx.importer().import_file(setting_id, file.path()).await.unwrap();

    assert_eq!(report.summary.dropped, 1);
    assert_eq!(report.summary.created, 2);
    assert_eq!(ctx.repos.product_repo.count_supplier_products(supplier.id).unwrap(), 2);
}

#[tokio::test]
async fn test_create_new_disabled_skips_unknown_rows() {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let links = || {
        vec![
            link(FieldKey::Article, Some("Art"), None),
            link(FieldKey::SupplierPrice, Some("Price"), None),
        ]
    };
    let seed_id = save_setting(&ctx.repos, &setting(supplier.id, links()));
    let mut update_only = setting(supplier.id, links());
    update_only.create_new = false;
    let update_id = save_setting(&ctx.repos, &update_only);
    let importer = ctx.importer();

    let seed = write_csv(&["Art,Price", "A1,10"]);
    importer.import_file(seed_id, seed.path()).await.unwrap();

    let feed = write_csv(&["Art,Price", "A1,15", "A2,20"]);
    let report = importer.import_file(update_id, feed.path()).await.unwrap();
    assert_eq!(report.summary.updated, 1);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.created, 0);
    assert_eq!(ctx.repos.product_repo.count_supplier_products(supplier.id).unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_rows_update_same_product() {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let setting_id = save_setting(
        &ctx.repos,
        &setting(
            supplier.id,
            vec![
                link(FieldKey::Article, Some("Art"), None),
                link(FieldKey::SupplierPrice, Some("Price"), None),
            ],
        ),
    );

    let file = write_csv(&["Art,Price", "A1,10", "A1,12"]);
    let report = ctx.importer().import_file(setting_id, file.path()).await.unwrap();

    assert_eq!(report.summary.created, 1);
    assert_eq!(report.summary.updated, 1);
    let product = ctx
        .repos
        .product_repo
        .find_supplier_product(supplier.id, "A1", "")
        .unwrap()
        .unwrap();
    assert_eq!(product.supplier_price, Some(dec("12")));
}

#[tokio::test]
async fn test_strict_numeric_collects_row_errors() {
    let ctx = create_test_db().unwrap();
    ctx.config
        .set_global_config_value(config_keys::IMPORT_STRICT_NUMERIC, "true")
        .unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let setting_id = save_setting(
        &ctx.repos,
        &setting(
            supplier.id,
            vec![
                link(FieldKey::Article, Some("Art"), None),
                link(FieldKey::SupplierPrice, Some("Price"), None),
            ],
        ),
    );

    let file = write_csv(&["Art,Price", "A1,abc", "A2,7"]);
    let report = ctx.importer().import_file(setting_id, file.path()).await.unwrap();

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.created, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row_number, 2);
    assert_eq!(report.errors[0].field.as_deref(), Some("supplier_price"));
    assert!(report.message(5).contains("失败 1 条"));
}

#[tokio::test]
async fn test_dict_substitution_and_virtual_initial_column() {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let setting_id = save_setting(
        &ctx.repos,
        &setting(
            supplier.id,
            vec![
                link(FieldKey::Article, Some("Art"), None),
                with_dict(link(FieldKey::Manufacturer, Some("Brand"), None), &[("BSH", "Bosch")]),
                link(FieldKey::Stock, None, Some("3")),
            ],
        ),
    );

    let file = write_csv(&["Art,Brand", "A1,BSH", "A2,Makita"]);
    let report = ctx.importer().import_file(setting_id, file.path()).await.unwrap();
    assert_eq!(report.summary.created, 2);
    assert!(report.stock_column_imported);
    assert!(!report.price_columns_imported);

    let names: Vec<String> = ctx
        .repos
        .catalog_repo
        .list_manufacturers()
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["Bosch".to_string(), "Makita".to_string()]);

    let product = ctx
        .repos
        .product_repo
        .find_supplier_product(supplier.id, "A1", "")
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, Some(3));
}

#[tokio::test]
async fn test_priced_only_drops_rows_without_price() {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let mut config = setting(
        supplier.id,
        vec![
            link(FieldKey::Article, Some("Art"), None),
            link(FieldKey::SupplierPrice, Some("Price"), None),
        ],
    );
    config.priced_only = true;
    let setting_id = save_setting(&ctx.repos, &config);

    let file = write_csv(&["Art,Price", "A1,", "A2,5"]);
    let report = ctx.importer().import_file(setting_id, file.path()).await.unwrap();
    assert_eq!(report.summary.dropped, 1);
    assert_eq!(report.summary.created, 1);
}

#[tokio::test]
async fn test_import_errors_abort_batch() {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let setting_id = save_setting(
        &ctx.repos,
        &setting(supplier.id, vec![link(FieldKey::Article, Some("Art"), None)]),
    );
    let importer = ctx.importer();

    let result = importer.import_file(999, Path::new("feed.csv")).await;
    assert!(matches!(result, Err(ImportError::SettingNotFound(999))));

    let result = importer.import_file(setting_id, Path::new("feed.txt")).await;
    assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));

    let result = importer.import_file(setting_id, Path::new("missing.csv")).await;
    assert!(matches!(result, Err(ImportError::FileNotFound(_))));

    let file = write_csv(&["Code,Price", "A1,10"]);
    let result = importer.import_file(setting_id, file.path()).await;
    assert!(matches!(result, Err(ImportError::InvalidSetting(_))));
}

async fn reimport_with_content_flag(update_main_content: bool) -> (String, Option<String>, Option<String>) {
    let ctx = create_test_db().unwrap();
    let supplier = ctx.repos.supplier_repo.create("Acme", Decimal::ONE).unwrap();
    let mut links = full_links();
    links.push(link(FieldKey::Sku, Some("Sku"), None));
    let mut config = setting(supplier.id, links);
    config.update_main_content = update_main_content;
    let setting_id = save_setting(&ctx.repos, &config);
    let importer = ctx.importer();

    let first = write_csv(&["Art,Title,Price,Qty,Brand,Cat,Sku", "A1,Drill,10,4,Bosch,Tools,SKU-1"]);
    importer.import_file(setting_id, first.path()).await.unwrap();

    let second = write_csv(&["Art,Title,Price,Qty,Brand,Cat,Sku", "A1,Drill Pro,12,4,Makita,Tools,SKU-2"]);
    let report = importer.import_file(setting_id, second.path()).await.unwrap();
    assert_eq!(report.summary.main_created, 0);

    let mains = ctx.repos.product_repo.find_main_products(supplier.id).unwrap();
    assert_eq!(mains.len(), 1);
    let names = ctx.repos.catalog_repo.manufacturer_names().unwrap();
    let manufacturer = mains[0].manufacturer_id.and_then(|id| names.get(&id).cloned());
    (mains[0].name.clone(), manufacturer, mains[0].sku.clone())
}

#[tokio::test]
async fn test_update_main_content_refreshes_existing_main_product() {
    let (name, manufacturer, sku) = reimport_with_content_flag(true).await;
    assert_eq!(name, "Drill Pro");
    assert_eq!(manufacturer.as_deref(), Some("Makita"));
    assert_eq!(sku.as_deref(), Some("SKU-2"));
}

#[tokio::test]
async fn test_main_product_content_kept_without_flag() {
    let (name, manufacturer, sku) = reimport_with_content_flag(false).await;
    assert_eq!(name, "Drill");
    assert_eq!(manufacturer.as_deref(), Some("Bosch"));
    assert_eq!(sku.as_deref(), Some("SKU-1"));
}
