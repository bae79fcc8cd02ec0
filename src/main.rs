// ==========================================
// 供应商价目表管理系统 - 命令行入口
// ==========================================
// 用法:
//   price-list-manager [--db-path <path>] init
//   price-list-manager [--db-path <path>] import <setting_id> <file>
//   price-list-manager [--db-path <path>] sync
// 数据库: --db-path，否则 PRICE_LIST_MANAGER_DB_PATH 或 ./price_list_manager.db
// ==========================================

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use price_list_manager::app::{get_default_db_path, AppState};
use price_list_manager::logging;

#[derive(Debug, Parser)]
#[command(name = "price-list-manager")]
#[command(about = "供应商价目表导入与加价规则工具")]
#[command(version)]
struct Cli {
    /// 数据库文件路径
    #[arg(long)]
    db_path: Option<String>,

    /// 以 JSON 行格式输出日志
    #[arg(long)]
    json_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// 建表（已存在则跳过）
    Init,

    /// 按导入配置导入一个价目表文件
    Import {
        /// 导入配置 id
        setting_id: i64,
        /// xls/xlsx/xlsm/csv 文件
        file: PathBuf,
    },

    /// 刷新搜索向量、应用/废弃加价规则、汇总库存
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.json_log {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{} v{}", price_list_manager::APP_NAME, price_list_manager::VERSION);
    tracing::info!("==================================================");

    let db_path = cli.db_path.unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path).await.map_err(anyhow::Error::msg)?;

    match cli.command {
        Command::Init => {
            tracing::info!(db_path = %state.db_path, "数据库已初始化");
        }
        Command::Import { setting_id, file } => {
            let response = state.import_api.enqueue_import(setting_id, file).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Sync => {
            let now = Utc::now();
            let report = state.sync_service.run(now.date_naive(), now)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    state.import_api.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["price-list-manager", "init"]).unwrap();
        assert_eq!(cli.command, Command::Init);
        assert_eq!(cli.db_path, None);

        let cli = Cli::try_parse_from(["price-list-manager", "--db-path", "/tmp/p.db", "sync"]).unwrap();
        assert_eq!(cli.command, Command::Sync);
        assert_eq!(cli.db_path.as_deref(), Some("/tmp/p.db"));

        let cli = Cli::try_parse_from(["price-list-manager", "import", "3", "feed.xlsx"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Import {
                setting_id: 3,
                file: PathBuf::from("feed.xlsx")
            }
        );
    }

    #[test]
    fn test_rejects_malformed_arguments() {
        assert!(Cli::try_parse_from(["price-list-manager", "import", "x", "feed.xlsx"]).is_err());
        assert!(Cli::try_parse_from(["price-list-manager", "import", "3"]).is_err());
        assert!(Cli::try_parse_from(["price-list-manager"]).is_err());
    }
}
