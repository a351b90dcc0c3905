//! 会话记录：按顺序保存的消息列表
//!
//! 只追加；唯一例外是最后一条消息可以原地修改（流式追加、注解改写），
//! 一旦追加了更新的消息，之前的消息即不可变。

use serde::{Deserialize, Serialize};

/// 消息角色（code 为代码解释器的输入）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Code,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self {
            role: Role::Code,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TranscriptStore {
    messages: Vec<Message>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }

    /// 向最后一条消息追加文本；列表为空时返回 false
    pub fn append_to_last(&mut self, fragment: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.text.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// 把最后一条消息中所有 `from` 替换为 `to`，返回替换次数
    pub fn replace_in_last(&mut self, from: &str, to: &str) -> usize {
        if from.is_empty() {
            return 0;
        }
        match self.messages.last_mut() {
            Some(last) => {
                let count = last.text.matches(from).count();
                if count > 0 {
                    last.text = last.text.replace(from, to);
                }
                count
            }
            None => 0,
        }
    }

    /// 渲染用的一致快照
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
