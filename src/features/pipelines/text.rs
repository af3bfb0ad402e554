use serde_json::{Value, json};

use crate::error::LlmError;
use crate::features::llm::LlmClient;

use super::keywords::KeywordPlan;

/// 问候语长度上限（字符）
const MAX_GREETING_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "你是一个界面文案作者。用主题的口吻写一句简短的欢迎语，\
与主题世界观一致，不超过两句话，不要使用表情符号。";

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "greeting": {
                "type": "string",
                "description": "主题风格的欢迎语"
            }
        },
        "required": ["greeting"],
        "additionalProperties": false
    })
}

/// 执行问候语管线。
pub async fn generate(llm: &LlmClient, plan: &KeywordPlan) -> Result<String, LlmError> {
    let out = llm
        .structured("theme_greeting", SYSTEM_PROMPT, &plan.context_line(), schema())
        .await?;

    let greeting = out
        .get("greeting")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::Json("问候语管线产出为空".to_string()))?;

    Ok(truncate_chars(greeting, MAX_GREETING_CHARS))
}

/// 按字符截断（不切断多字节字符）。
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}
