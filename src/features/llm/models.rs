use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 单条对话消息
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// 角色：system / user
    pub role: &'static str,
    /// 消息正文
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// 结构化输出的 JSON Schema 描述
///
/// `strict=true` 时模型输出被约束为完全符合 schema，
/// 取代自由文本解析（调用方直接拿到可解析的 JSON）。
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    /// schema 名称（上游要求必填）
    pub name: String,
    /// 严格模式
    pub strict: bool,
    /// JSON Schema 本体
    pub schema: Value,
}

/// response_format 字段：固定为 json_schema 模式
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonSchema {
        json_schema: JsonSchemaFormat,
    },
}

impl ResponseFormat {
    pub fn json_schema(name: impl Into<String>, schema: Value) -> Self {
        ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: name.into(),
                strict: true,
                schema,
            },
        }
    }
}

/// chat completions 请求体
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

/// 响应封套：只反序列化我们关心的路径（choices[0].message.content）
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}
