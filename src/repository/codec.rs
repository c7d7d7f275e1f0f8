// ==========================================
// 行映射辅助: 枚举 / JSON 列解码
// ==========================================

use rusqlite::types::Type;
use serde_json::Value as JsonValue;

/// 解码文本枚举列，未知值转换为 FromSqlConversionFailure
pub(crate) fn decode_enum<T>(
    col: usize,
    raw: String,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(col, Type::Text, format!("未知枚举值: {}", raw).into())
    })
}

/// JSON 文本列 → JsonValue（解析失败视为空）
pub(crate) fn decode_json(raw: Option<String>) -> Option<JsonValue> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

pub(crate) fn encode_json(value: &Option<JsonValue>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OrderStage;

    #[test]
    fn test_decode_enum_unknown_value() {
        let ok = decode_enum(0, "PENDING".to_string(), OrderStage::from_db_str).unwrap();
        assert_eq!(ok, OrderStage::Pending);

        let err = decode_enum(3, "BOGUS".to_string(), OrderStage::from_db_str);
        assert!(matches!(
            err,
            Err(rusqlite::Error::FromSqlConversionFailure(3, Type::Text, _))
        ));
    }

    #[test]
    fn test_json_columns() {
        assert_eq!(decode_json(Some("{\"a\":1}".to_string())).unwrap()["a"], 1);
        assert!(decode_json(Some("not json".to_string())).is_none());
        assert_eq!(encode_json(&Some(serde_json::json!([1]))), Some("[1]".to_string()));
    }
}
