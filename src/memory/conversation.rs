//! 对话日志：只追加的消息序列
//!
//! 每条消息创建后不可变；插入顺序即唯一有意义的顺序，Supervisor 与 Worker 都读取完整历史。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Worker 在一次激活中发起的工具调用记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: serde_json::Value,
    pub success: bool,
    /// 产物位置（图表 / 报告文件路径）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// 工具返回的是替代（模拟）数据
    #[serde(default)]
    pub simulated: bool,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// 产生该消息的 worker 或 supervisor 名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structured_calls: Vec<ToolCallRecord>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            author: None,
            content: content.into(),
            structured_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_calls(mut self, calls: Vec<ToolCallRecord>) -> Self {
        self.structured_calls = calls;
        self
    }

    pub fn is_from(&self, author: &str) -> bool {
        self.author.as_deref() == Some(author)
    }
}

/// 只追加的对话日志
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut conv = Conversation::new();
        conv.append(Message::user("first"));
        conv.append(Message::assistant("second").with_author("data_analyst"));
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].content, "first");
        assert!(conv.last().unwrap().is_from("data_analyst"));
    }

    #[test]
    fn test_message_serde_omits_empty_fields() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("author").is_none());
        assert!(json.get("structured_calls").is_none());
    }
}
