//! 经 async-openai byot 接口收发的 Assistant 对象
//!
//! Assistant 的 tools 需要原样透传 v1 的 retrieval 工具（async-openai 的类型里没有它），
//! 因此 Assistant 的请求体用 AssistantDescriptor，响应体用这里的宽松结构；其余载荷都用 async-openai 的类型。

use serde::Deserialize;

use crate::assistant::{AssistantDescriptor, ToolSpec};

/// GET/POST /assistants 返回的对象（只取用到的字段，其余忽略）
#[derive(Clone, Debug, Deserialize)]
pub struct AssistantObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

impl AssistantObject {
    /// 观测到的描述；null 的 name / instructions 视为空串
    pub fn descriptor(&self) -> AssistantDescriptor {
        AssistantDescriptor {
            name: self.name.clone().unwrap_or_default(),
            instructions: self.instructions.clone().unwrap_or_default(),
            model: self.model.clone(),
            tools: self.tools.clone(),
        }
    }
}
