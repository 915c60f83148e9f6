//! 工具参数 Schema 与工具调用 JSON Schema
//!
//! ToolSchema 按声明顺序保存参数（名称、描述、是否必填、期望类型），validate 只检查已声明的参数，
//! 未声明的参数原样放行。tool_call_schema_json 用 schemars 生成合法 tool call 的 JSON Schema，拼入 system prompt。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// 参数期望类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    /// JSON 整数；布尔与浮点不算
    Integer,
    Boolean,
    /// 任意 JSON 数字
    Number,
    Object,
    Array,
    Any,
}

impl ArgType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Integer => value.is_i64() || value.is_u64(),
            ArgType::Boolean => value.is_boolean(),
            ArgType::Number => value.is_number(),
            ArgType::Object => value.is_object(),
            ArgType::Array => value.is_array(),
            ArgType::Any => true,
        }
    }

    fn json_type(&self) -> Option<&'static str> {
        match self {
            ArgType::String => Some("string"),
            ArgType::Integer => Some("integer"),
            ArgType::Boolean => Some("boolean"),
            ArgType::Number => Some("number"),
            ArgType::Object => Some("object"),
            ArgType::Array => Some("array"),
            ArgType::Any => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub arg_type: ArgType,
}

impl ToolArgument {
    pub fn new(name: &str, description: &str, required: bool, arg_type: ArgType) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required,
            arg_type,
        }
    }

    pub fn required(name: &str, description: &str, arg_type: ArgType) -> Self {
        Self::new(name, description, true, arg_type)
    }

    pub fn optional(name: &str, description: &str, arg_type: ArgType) -> Self {
        Self::new(name, description, false, arg_type)
    }
}

/// 有序参数表
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    arguments: Vec<ToolArgument>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名参数后注册者覆盖前者，位置不变
    pub fn register(&mut self, argument: ToolArgument) {
        match self.arguments.iter_mut().find(|a| a.name == argument.name) {
            Some(existing) => *existing = argument,
            None => self.arguments.push(argument),
        }
    }

    pub fn with(mut self, argument: ToolArgument) -> Self {
        self.register(argument);
        self
    }

    pub fn arguments(&self) -> &[ToolArgument] {
        &self.arguments
    }

    /// 按声明顺序检查；返回第一条错误
    pub fn validate(&self, input: &Map<String, Value>) -> Result<(), String> {
        for arg in &self.arguments {
            match input.get(&arg.name) {
                None if arg.required => return Err(format!("Argument {} is required", arg.name)),
                None => {}
                Some(value) if !arg.arg_type.matches(value) => {
                    return Err(format!("Argument {} is invalid", arg.name));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// 参数 JSON Schema（供 system prompt 中的工具列表）
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for arg in &self.arguments {
            let mut prop = Map::new();
            if let Some(t) = arg.arg_type.json_type() {
                prop.insert("type".into(), json!(t));
            }
            prop.insert("description".into(), json!(arg.description));
            properties.insert(arg.name.clone(), Value::Object(prop));
        }
        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// `<tool_call>` 包装内的 JSON：`{"tool": "...", "arguments": {...}}`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ToolCallRequest {
    /// 已注册的工具名，如 fs.write、npm.start
    #[serde(default)]
    pub tool: Option<String>,
    /// 工具参数对象，缺省为 {}
    #[serde(default = "empty_object")]
    pub arguments: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ToolCallRequest {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: Some(tool.into()),
            arguments,
        }
    }

    /// 工具名缺失、null 或空串都视为缺失
    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_deref().filter(|t| !t.is_empty())
    }
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallRequest);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
