//! 参数解析与校验
//!
//! 模型给出的 arguments 是 JSON 字符串；先解析为对象，再按 ToolDefinition 的 schema 校验。
//! 未声明的键忽略；必填缺失或为 null、类型不符均视为参数错误。

use serde_json::{Map, Value};

use crate::catalog::ToolDefinition;

/// 解析模型给出的 arguments 字符串；空串视为 {}
pub fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(format!("arguments must be a JSON object, got {}", kind_of(&other))),
        Err(e) => Err(format!("arguments are not valid JSON: {e}")),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn validate_arguments(def: &ToolDefinition, args: &Map<String, Value>) -> Result<(), String> {
    let missing: Vec<&str> = def
        .required_names()
        .into_iter()
        .filter(|name| args.get(*name).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required argument(s): {}", missing.join(", ")));
    }

    for p in &def.parameters {
        match args.get(&p.name) {
            None | Some(Value::Null) => {}
            Some(v) if p.param_type.accepts(v) => {}
            Some(v) => {
                return Err(format!(
                    "argument '{}' must be {}, got {}",
                    p.name,
                    p.param_type.as_str(),
                    kind_of(v)
                ))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParamType;
    use serde_json::json;

    fn def() -> ToolDefinition {
        ToolDefinition::write("update_item", "Update an item")
            .required_param("id", ParamType::String, "Item id")
            .optional_param("quantity", ParamType::Integer, "New quantity")
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_arguments() {
        assert!(parse_arguments("").unwrap().is_empty());
        assert!(parse_arguments("null").unwrap().is_empty());
        assert_eq!(parse_arguments(r#"{"id":"X1"}"#).unwrap()["id"], "X1");
        assert!(parse_arguments("[1,2]").unwrap_err().contains("array"));
        assert!(parse_arguments("{oops").unwrap_err().contains("not valid JSON"));
    }

    #[test]
    fn test_valid_arguments_pass() {
        assert!(validate_arguments(&def(), &obj(json!({"id": "X1", "quantity": 3}))).is_ok());
        assert!(validate_arguments(&def(), &obj(json!({"id": "X1", "extra": true}))).is_ok());
    }

    #[test]
    fn test_missing_required_fails() {
        let err = validate_arguments(&def(), &obj(json!({"quantity": 3}))).unwrap_err();
        assert!(err.contains("id"));
        assert!(validate_arguments(&def(), &obj(json!({"id": null}))).is_err());
    }

    #[test]
    fn test_type_mismatch_fails() {
        let err = validate_arguments(&def(), &obj(json!({"id": "X1", "quantity": "three"}))).unwrap_err();
        assert!(err.contains("quantity"));
        assert!(err.contains("integer"));
    }
}
