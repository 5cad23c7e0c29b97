//! 工具目录：所有可调用操作的静态描述
//!
//! register 在启动期校验（名称唯一、必填参数均已声明），失败为 Validation 错误；
//! 构建完成后放入 Arc 共享，之后只读。list / function_specs 交给模型作为可用能力。

pub mod definition;

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::core::AgentError;

pub use definition::{ParamType, ParameterSpec, SafetyClass, ToolDefinition};

/// function-calling 协议对工具名的限制：1-64 个字母、数字、下划线或连字符
const MAX_TOOL_NAME_LEN: usize = 64;

fn valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_TOOL_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 工具目录：保持注册顺序
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一次性构建目录，任一条目非法即失败
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ToolDefinition>,
    ) -> Result<Self, AgentError> {
        let mut catalog = Self::new();
        for def in definitions {
            catalog.register(def)?;
        }
        Ok(catalog)
    }

    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), AgentError> {
        validate_definition(&tool)?;
        if self.index.contains_key(&tool.name) {
            return Err(AgentError::Validation(format!(
                "duplicate tool name '{}'",
                tool.name
            )));
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 交给模型的工具列表（function-calling JSON），顺序与注册顺序一致
    pub fn function_specs(&self) -> Vec<Value> {
        self.tools.iter().map(ToolDefinition::to_function_spec).collect()
    }
}

fn validate_definition(tool: &ToolDefinition) -> Result<(), AgentError> {
    if !valid_tool_name(&tool.name) {
        return Err(AgentError::Validation(format!(
            "invalid tool name '{}'",
            tool.name
        )));
    }
    let mut seen = HashSet::new();
    for p in &tool.parameters {
        if p.name.is_empty() {
            return Err(AgentError::Validation(format!(
                "tool '{}' declares a parameter with an empty name",
                tool.name
            )));
        }
        if !seen.insert(p.name.as_str()) {
            return Err(AgentError::Validation(format!(
                "tool '{}' declares parameter '{}' twice",
                tool.name, p.name
            )));
        }
    }
    if let Some(missing) = tool.required.iter().find(|r| !seen.contains(r.as_str())) {
        return Err(AgentError::Validation(format!(
            "tool '{}' requires undeclared parameter '{}'",
            tool.name, missing
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lookup() -> ToolDefinition {
        ToolDefinition::read("lookup_item", "Look up an item")
            .required_param("id", ParamType::String, "Item id")
    }

    #[test]
    fn test_register_and_list_in_order() {
        let catalog = ToolCatalog::from_definitions([
            lookup(),
            ToolDefinition::write("update_item", "Update an item"),
        ])
        .unwrap();
        assert_eq!(catalog.names(), vec!["lookup_item", "update_item"]);
        assert_eq!(catalog.function_specs().len(), 2);
        assert!(catalog.get("update_item").unwrap().is_write());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut catalog = ToolCatalog::new();
        catalog.register(lookup()).unwrap();
        let err = catalog.register(lookup()).unwrap_err();
        assert!(matches!(err, AgentError::Validation(ref m) if m.contains("duplicate")));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_undeclared_required_rejected() {
        let mut def = lookup();
        def.required.push("missing".to_string());
        assert!(matches!(
            ToolCatalog::new().register(def),
            Err(AgentError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut catalog = ToolCatalog::new();
        assert!(catalog.register(ToolDefinition::read("", "empty")).is_err());
        assert!(catalog.register(ToolDefinition::read("has space", "x")).is_err());
        assert!(catalog.register(ToolDefinition::read("a".repeat(65), "x")).is_err());
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let def = lookup().optional_param("id", ParamType::Integer, "again");
        assert!(ToolCatalog::new().register(def).is_err());
    }

    fn arb_definition() -> impl Strategy<Value = ToolDefinition> {
        (
            "[a-z][a-z_]{0,12}",
            prop::collection::btree_set("[a-z]{1,6}", 0..5),
            prop::collection::vec("[a-z]{1,6}", 0..4),
            any::<bool>(),
        )
            .prop_map(|(name, params, required, write)| {
                let mut def = if write {
                    ToolDefinition::write(name, "generated")
                } else {
                    ToolDefinition::read(name, "generated")
                };
                for p in params {
                    def = def.optional_param(&p, ParamType::String, "generated");
                }
                def.required = required;
                def
            })
    }

    proptest! {
        #[test]
        fn prop_registered_required_names_are_declared(defs in prop::collection::vec(arb_definition(), 0..12)) {
            let mut catalog = ToolCatalog::new();
            for def in defs {
                let declared: HashSet<String> = def.parameters.iter().map(|p| p.name.clone()).collect();
                let required_ok = def.required.iter().all(|r| declared.contains(r));
                let fresh = !catalog.contains(&def.name);
                let accepted = catalog.register(def).is_ok();
                prop_assert_eq!(accepted, required_ok && fresh);
            }
            for tool in catalog.list() {
                for r in tool.required_names() {
                    prop_assert!(tool.parameter(r).is_some());
                }
            }
        }

        #[test]
        fn prop_catalog_names_unique(defs in prop::collection::vec(arb_definition(), 0..12)) {
            let mut catalog = ToolCatalog::new();
            for def in defs {
                let _ = catalog.register(def);
            }
            let names = catalog.names();
            let unique: HashSet<&str> = names.iter().copied().collect();
            prop_assert_eq!(unique.len(), names.len());
        }
    }
}
