//! JSON 载荷键名与数据库列名之间的转换

use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier pattern compiles"));

/// 由服务端维护、不接受客户端写入的列
pub const MANAGED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// `isDeleted` -> `is_deleted`
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `deleted_at` -> `deletedAt`
pub fn to_camel_case(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut upper = false;
    for ch in column.chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// 校验后的列名
pub fn column_for(key: &str) -> Result<String, AppError> {
    let column = to_snake_case(key);
    if IDENTIFIER.is_match(&column) {
        Ok(column)
    } else {
        Err(AppError::BadRequest(format!("invalid field name: {}", key)))
    }
}

/// camelCase 载荷转换为以列名为键的对象
pub fn payload_to_columns(payload: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    payload
        .into_iter()
        .map(|(key, value)| column_for(&key).map(|column| (column, value)))
        .collect()
}

/// 数据库行（`to_jsonb`）转换为 camelCase 对象
pub fn row_to_camel(row: Value) -> Value {
    match row {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(column, value)| (to_camel_case(&column), value))
                .collect(),
        ),
        other => other,
    }
}
