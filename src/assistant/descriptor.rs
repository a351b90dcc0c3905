//! Assistant 描述：本地声明的期望配置与远端观测到的实际配置
//!
//! 两份描述「等价」当且仅当 name / instructions / model 相同且工具集合相同（与顺序无关）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AppError;

/// 函数工具定义（name / description / JSON Schema 参数）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
}

fn empty_parameters() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Assistant 可用的工具（封闭标签）
///
/// 远端返回的工具对象可能带有额外字段（如 file_search.ranking_options），反序列化时忽略；
/// 未知类型落到 `Unsupported`，本地描述中不允许出现。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolSpec {
    CodeInterpreter,
    Retrieval,
    FileSearch,
    Function { function: FunctionSpec },
    #[serde(other)]
    Unsupported,
}

impl ToolSpec {
    /// 去重用的标签；函数工具按函数名区分
    pub fn tag(&self) -> String {
        match self {
            ToolSpec::CodeInterpreter => "code_interpreter".to_string(),
            ToolSpec::Retrieval => "retrieval".to_string(),
            ToolSpec::FileSearch => "file_search".to_string(),
            ToolSpec::Function { function } => format!("function:{}", function.name),
            ToolSpec::Unsupported => "unsupported".to_string(),
        }
    }
}

/// Assistant 的期望 / 观测形态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantDescriptor {
    pub name: String,
    pub instructions: String,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

impl AssistantDescriptor {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
        tools: Vec<ToolSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            tools,
        }
    }

    /// 校验本地声明：name / model 非空、无未知工具、无重复标签
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Configuration("assistant name is empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Configuration("assistant model is empty".into()));
        }
        let mut seen = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            if matches!(tool, ToolSpec::Unsupported) {
                return Err(AppError::Configuration(
                    "assistant declares an unsupported tool type".into(),
                ));
            }
            let tag = tool.tag();
            if seen.contains(&tag) {
                return Err(AppError::Configuration(format!("duplicate tool: {tag}")));
            }
            seen.push(tag);
        }
        Ok(())
    }

    /// 逐字段比较，工具按集合比较
    pub fn is_equivalent(&self, other: &AssistantDescriptor) -> bool {
        self.name == other.name
            && self.instructions == other.instructions
            && self.model == other.model
            && same_tool_set(&self.tools, &other.tools)
    }

    /// 与 other 不同的字段名，用于日志
    pub fn diff_fields(&self, other: &AssistantDescriptor) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name != other.name {
            fields.push("name");
        }
        if self.instructions != other.instructions {
            fields.push("instructions");
        }
        if self.model != other.model {
            fields.push("model");
        }
        if !same_tool_set(&self.tools, &other.tools) {
            fields.push("tools");
        }
        fields
    }
}

/// 集合相等：长度相同且互相包含（Value 不可哈希，工具数很少，直接两两比较）
fn same_tool_set(a: &[ToolSpec], b: &[ToolSpec]) -> bool {
    a.len() == b.len() && a.iter().all(|t| b.contains(t)) && b.iter().all(|t| a.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(tools: Vec<ToolSpec>) -> AssistantDescriptor {
        AssistantDescriptor::new("EmpleaBot", "help with CVs", "gpt-4", tools)
    }

    #[test]
    fn test_tool_order_does_not_matter() {
        let a = desc(vec![ToolSpec::CodeInterpreter, ToolSpec::Retrieval]);
        let b = desc(vec![ToolSpec::Retrieval, ToolSpec::CodeInterpreter]);
        assert!(a.is_equivalent(&b));
        assert!(a.diff_fields(&b).is_empty());
    }

    #[test]
    fn test_field_change_detected() {
        let a = desc(vec![ToolSpec::CodeInterpreter]);
        let mut b = a.clone();
        b.model = "gpt-4o".into();
        assert!(!a.is_equivalent(&b));
        assert_eq!(a.diff_fields(&b), vec!["model"]);

        let c = desc(vec![ToolSpec::CodeInterpreter, ToolSpec::Retrieval]);
        assert_eq!(a.diff_fields(&c), vec!["tools"]);
    }

    #[test]
    fn test_duplicate_tools_rejected() {
        let d = desc(vec![ToolSpec::Retrieval, ToolSpec::Retrieval]);
        assert!(matches!(d.validate(), Err(AppError::Configuration(_))));
        assert!(desc(vec![ToolSpec::Retrieval]).validate().is_ok());
    }

    #[test]
    fn test_server_tool_payload_with_extra_fields() {
        let raw = r#"[
            {"type": "code_interpreter"},
            {"type": "file_search", "file_search": {"max_num_results": 20}},
            {"type": "brand_new_tool"}
        ]"#;
        let tools: Vec<ToolSpec> = serde_json::from_str(raw).unwrap();
        assert_eq!(
            tools,
            vec![ToolSpec::CodeInterpreter, ToolSpec::FileSearch, ToolSpec::Unsupported]
        );
    }

    #[test]
    fn test_function_tool_serializes_with_type_tag() {
        let tool = ToolSpec::Function {
            function: FunctionSpec {
                name: "lookup_job".into(),
                description: None,
                parameters: empty_parameters(),
            },
        };
        let v = serde_json::to_value(&tool).unwrap();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "lookup_job");
        assert_eq!(tool.tag(), "function:lookup_job");
    }
}
