// ==========================================
// 供应商价目表管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 提供幂等建表，唯一约束即批量 upsert 的冲突目标
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表语句（全部 IF NOT EXISTS，可重复执行）
///
/// 说明：
/// - 金额以 TEXT 保存，由 rust_decimal 解析，避免浮点误差
/// - 时间为 RFC 3339 TEXT，日期为 YYYY-MM-DD
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS supplier (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    currency_rate TEXT NOT NULL DEFAULT '1',
    price_updated_at TEXT,
    stock_updated_at TEXT
);

CREATE TABLE IF NOT EXISTS manufacturer (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS manufacturer_dict (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alias TEXT NOT NULL UNIQUE,
    manufacturer_id INTEGER NOT NULL REFERENCES manufacturer(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS category (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    parent_id INTEGER REFERENCES category(id) ON DELETE CASCADE,
    path TEXT NOT NULL UNIQUE,
    depth INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS discount_group (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES supplier(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    UNIQUE (supplier_id, name)
);

CREATE TABLE IF NOT EXISTS main_product (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES supplier(id) ON DELETE CASCADE,
    article TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    sku TEXT,
    category_id INTEGER REFERENCES category(id) ON DELETE SET NULL,
    manufacturer_id INTEGER REFERENCES manufacturer(id) ON DELETE SET NULL,
    stock INTEGER NOT NULL DEFAULT 0,
    prime_cost TEXT,
    wholesale_price TEXT,
    basic_price TEXT,
    m_price TEXT,
    wholesale_price_extra TEXT,
    price_updated_at TEXT,
    stock_updated_at TEXT,
    search_vector TEXT,
    UNIQUE (supplier_id, article, name)
);

CREATE TABLE IF NOT EXISTS supplier_product (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES supplier(id) ON DELETE CASCADE,
    article TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    manufacturer_id INTEGER REFERENCES manufacturer(id) ON DELETE SET NULL,
    stock INTEGER,
    supplier_price TEXT,
    rrp TEXT,
    discount_price TEXT,
    main_product_id INTEGER REFERENCES main_product(id) ON DELETE SET NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (supplier_id, article, name)
);

CREATE INDEX IF NOT EXISTS idx_supplier_product_main ON supplier_product(main_product_id);

CREATE TABLE IF NOT EXISTS supplier_product_discount_group (
    supplier_product_id INTEGER NOT NULL REFERENCES supplier_product(id) ON DELETE CASCADE,
    discount_group_id INTEGER NOT NULL REFERENCES discount_group(id) ON DELETE CASCADE,
    PRIMARY KEY (supplier_product_id, discount_group_id)
);

CREATE TABLE IF NOT EXISTS main_product_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    main_product_id INTEGER NOT NULL REFERENCES main_product(id) ON DELETE CASCADE,
    stock INTEGER NOT NULL DEFAULT 0,
    prime_cost TEXT,
    wholesale_price TEXT,
    basic_price TEXT,
    m_price TEXT,
    wholesale_price_extra TEXT,
    UNIQUE (created_at, main_product_id)
);

CREATE TABLE IF NOT EXISTS setting (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    supplier_id INTEGER NOT NULL REFERENCES supplier(id) ON DELETE CASCADE,
    sheet_name TEXT NOT NULL DEFAULT '',
    differ_by_name INTEGER NOT NULL DEFAULT 0,
    priced_only INTEGER NOT NULL DEFAULT 1,
    create_new INTEGER NOT NULL DEFAULT 1,
    update_main INTEGER NOT NULL DEFAULT 1,
    update_main_content INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS link (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    setting_id INTEGER NOT NULL REFERENCES setting(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT,
    initial TEXT,
    UNIQUE (setting_id, key)
);

CREATE TABLE IF NOT EXISTS dict (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    link_id INTEGER NOT NULL REFERENCES link(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    UNIQUE (link_id, key, value)
);

CREATE TABLE IF NOT EXISTS price_manager (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    supplier_id INTEGER NOT NULL REFERENCES supplier(id) ON DELETE CASCADE,
    has_rrp INTEGER,
    price_from TEXT,
    price_to TEXT,
    date_from TEXT,
    date_to TEXT,
    source TEXT NOT NULL,
    fixed_price TEXT,
    dest TEXT NOT NULL,
    markup TEXT NOT NULL DEFAULT '0',
    increase TEXT NOT NULL DEFAULT '0',
    deprecated INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS price_manager_discount_group (
    price_manager_id INTEGER NOT NULL REFERENCES price_manager(id) ON DELETE CASCADE,
    discount_group_id INTEGER NOT NULL REFERENCES discount_group(id) ON DELETE CASCADE,
    PRIMARY KEY (price_manager_id, discount_group_id)
);

CREATE TABLE IF NOT EXISTS price_manager_category (
    price_manager_id INTEGER NOT NULL REFERENCES price_manager(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES category(id) ON DELETE CASCADE,
    PRIMARY KEY (price_manager_id, category_id)
);

CREATE TABLE IF NOT EXISTS price_tag (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    main_product_id INTEGER NOT NULL REFERENCES main_product(id) ON DELETE CASCADE,
    price_manager_id INTEGER NOT NULL REFERENCES price_manager(id) ON DELETE CASCADE,
    dest TEXT NOT NULL,
    source TEXT NOT NULL,
    markup TEXT NOT NULL,
    increase TEXT NOT NULL,
    fixed_price TEXT,
    price TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (main_product_id, price_manager_id, dest)
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（级联删除依赖它）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema 并记录版本（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
