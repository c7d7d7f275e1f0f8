// ==========================================
// 采购订单全流程系统 - 命令行入口
// ==========================================
// 用法:
//   procurement-lifecycle ingest <csv_path> <actor>
//   procurement-lifecycle generate <actor>
// 数据库: PROCUREMENT_DB_PATH 或用户数据目录
// ==========================================

use procurement_lifecycle::app::{get_default_db_path, AppState};
use procurement_lifecycle::logging;

const USAGE: &str = "用法:\n  procurement-lifecycle ingest <csv_path> <actor>\n  procurement-lifecycle generate <actor>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", procurement_lifecycle::APP_NAME, procurement_lifecycle::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["ingest", csv_path, actor] => {
            let summary = state.import_api.import_file(csv_path, actor).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        ["generate", actor] => {
            let outcome = state.slip_api.generate_documents(actor)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
