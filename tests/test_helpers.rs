// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、产品目录种子数据、订单行构造
// ==========================================

#![allow(dead_code)]

use procurement_lifecycle::config::{LifecycleConfig, LifecycleConfigReader};
use procurement_lifecycle::domain::order::{ProductIdentity, RawOrderRow};
use procurement_lifecycle::domain::types::{Actor, Role};
use procurement_lifecycle::repository::ProductRepository;
use std::error::Error;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    procurement_lifecycle::logging::init_test();

    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    procurement_lifecycle::db::open_and_init(&db_path)?;
    seed_catalog(&db_path)?;

    Ok((temp_file, db_path))
}

/// 写入测试产品目录
///
/// - P55 / 旧编码 55: Nitrile Gloves
/// - P56 / 旧编码 56: Surgical Masks
/// - P101 / 旧编码 101: Saline 500ml
/// - P102 / 无旧编码: Syringe 5ml
pub fn seed_catalog(db_path: &str) -> Result<(), Box<dyn Error>> {
    let conn = procurement_lifecycle::db::open_and_init(db_path)?;
    for (id, legacy, name) in [
        ("P55", Some("55"), "Nitrile Gloves"),
        ("P56", Some("56"), "Surgical Masks"),
        ("P101", Some("101"), "Saline 500ml"),
        ("P102", None, "Syringe 5ml"),
    ] {
        ProductRepository::upsert(
            &conn,
            &ProductIdentity {
                product_id: id.to_string(),
                legacy_id: legacy.map(str::to_string),
                name: name.to_string(),
            },
        )?;
    }
    Ok(())
}

/// 统计表行数
pub fn count_rows(db_path: &str, table: &str) -> Result<i64, Box<dyn Error>> {
    let conn = procurement_lifecycle::db::open_and_init(db_path)?;
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}

/// 安装一个在条件满足时中止写入的触发器，用于模拟中途失败
pub fn install_abort_trigger(
    db_path: &str,
    name: &str,
    table: &str,
    condition: &str,
) -> Result<(), Box<dyn Error>> {
    let conn = procurement_lifecycle::db::open_and_init(db_path)?;
    conn.execute_batch(&format!(
        "CREATE TRIGGER {name} BEFORE INSERT ON {table} WHEN {condition} \
         BEGIN SELECT RAISE(ABORT, 'forced failure'); END;"
    ))?;
    Ok(())
}

/// 默认配置（不读库）
pub fn default_config() -> Arc<dyn LifecycleConfigReader> {
    Arc::new(LifecycleConfig::default())
}

/// 构造一行已映射的订单行
pub fn order_row(
    row_number: usize,
    order_reference: &str,
    product_reference: &str,
    quantity: f64,
    supplier_hint: Option<&str>,
) -> RawOrderRow {
    RawOrderRow {
        order_reference: Some(order_reference.to_string()),
        product_reference: Some(product_reference.to_string()),
        legacy_product_id: None,
        product_name: None,
        customer: Some(format!("Ward-{}", order_reference)),
        quantity: Some(quantity),
        supplier_hint: supplier_hint.map(str::to_string),
        row_number,
    }
}

pub fn allocator() -> Actor {
    Actor::new("alice", Role::Staff)
}

pub fn supervisor() -> Actor {
    Actor::new("sam", Role::Supervisor)
}

pub fn staff(user_id: &str) -> Actor {
    Actor::new(user_id, Role::Staff)
}
