//! 宽松字段解析
//!
//! 推送负载由不同版本的后端产生，同一字段可能是数字也可能是字符串。

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 将字符串或整数解析为 ID 字符串；null、空字符串与缺失视为 None
pub fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| value_to_id(&v)))
}

/// 将浮点、整数或数字字符串解析为秒级时间戳（向下取整）
pub fn deserialize_opt_epoch_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| value_to_epoch_seconds(&v)))
}

/// 从 JSON 值提取 ID
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 从 JSON 值提取秒级时间戳
pub fn value_to_epoch_seconds(value: &Value) -> Option<i64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some(seconds.floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "deserialize_opt_id")]
        id: Option<String>,
        #[serde(default, deserialize_with = "deserialize_opt_epoch_seconds")]
        ts: Option<i64>,
    }

    #[test]
    fn test_id_accepts_number_and_string() {
        let p: Row = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(p.id.as_deref(), Some("42"));

        let p: Row = serde_json::from_value(json!({"id": " U123 "})).unwrap();
        assert_eq!(p.id.as_deref(), Some("U123"));

        let p: Row = serde_json::from_value(json!({"id": ""})).unwrap();
        assert!(p.id.is_none());

        let p: Row = serde_json::from_value(json!({"id": null})).unwrap();
        assert!(p.id.is_none());

        let p: Row = serde_json::from_value(json!({})).unwrap();
        assert!(p.id.is_none());
    }

    #[test]
    fn test_epoch_seconds_floor() {
        let p: Row = serde_json::from_value(json!({"ts": 1_700_000_000.9})).unwrap();
        assert_eq!(p.ts, Some(1_700_000_000));

        let p: Row = serde_json::from_value(json!({"ts": "1700000000.25"})).unwrap();
        assert_eq!(p.ts, Some(1_700_000_000));

        let p: Row = serde_json::from_value(json!({"ts": "not-a-number"})).unwrap();
        assert!(p.ts.is_none());

        let p: Row = serde_json::from_value(json!({"ts": 0})).unwrap();
        assert!(p.ts.is_none());
    }
}
