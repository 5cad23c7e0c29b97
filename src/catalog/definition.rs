//! 工具定义：名称、描述、参数 schema、读写分类
//!
//! 进程启动时创建一次，之后不可变；to_function_spec 按 function-calling 协议渲染给模型。

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// 读写安全分类：WRITE 工具成功执行后会清空会话历史
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SafetyClass {
    Read,
    Write,
}

/// 参数类型（对应 JSON Schema 基本类型）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// JSON 值是否符合该类型；integer 只接受整数值
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

/// 单个参数声明
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// 工具定义
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    /// 额外的必填声明；catalog 注册时校验每个名字都在 parameters 中
    #[serde(default)]
    pub required: Vec<String>,
    pub safety: SafetyClass,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, safety: SafetyClass) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            required: Vec::new(),
            safety,
        }
    }

    pub fn read(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, SafetyClass::Read)
    }

    pub fn write(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, SafetyClass::Write)
    }

    fn param(mut self, name: &str, param_type: ParamType, description: &str, required: bool) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required,
        });
        self
    }

    pub fn required_param(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.param(name, param_type, description, true)
    }

    pub fn optional_param(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.param(name, param_type, description, false)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn is_write(&self) -> bool {
        self.safety == SafetyClass::Write
    }

    /// 所有必填参数名（去重，保持声明顺序）
    pub fn required_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let flagged = self.parameters.iter().filter(|p| p.required).map(|p| p.name.as_str());
        for name in flagged.chain(self.required.iter().map(String::as_str)) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// JSON Schema 形式的参数对象
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.parameters {
            properties.insert(
                p.name.clone(),
                json!({ "type": p.param_type.as_str(), "description": p.description }),
            );
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
        })
    }

    /// function-calling 协议下的工具条目
    pub fn to_function_spec(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema(),
            }
        })
    }
}
