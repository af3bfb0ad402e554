use serde_json::{Value, json};

use crate::error::LlmError;
use crate::features::llm::LlmClient;

/// 提取出的关键词数量上限
const MAX_KEYWORDS: usize = 8;

const SYSTEM_PROMPT: &str = "你是一个 UI 主题助手。用户会用一句话描述想要的界面主题，\
你需要提取出主题的视觉主体（subject）和用于图片搜索/风格生成的关键词列表。\
关键词使用英文小写，每个不超过三个单词。";

/// 关键词提取结果：驱动图片搜索，并作为其他管线的上下文。
#[derive(Debug, Clone)]
pub struct KeywordPlan {
    /// 主题的视觉主体（如 "super mario"）
    pub subject: String,
    /// 风格关键词
    pub keywords: Vec<String>,
}

impl KeywordPlan {
    /// 关键词提取失败时的降级方案：直接把原始提示词当作主体。
    pub fn fallback(prompt: &str) -> Self {
        Self {
            subject: prompt.trim().to_string(),
            keywords: Vec::new(),
        }
    }

    /// 拼出图片搜索用的查询串：主体 + 前两个关键词。
    pub fn search_query(&self) -> String {
        let mut parts = vec![self.subject.as_str()];
        parts.extend(self.keywords.iter().take(2).map(String::as_str));
        parts.join(" ")
    }

    /// 其他管线 prompt 中的上下文描述。
    pub fn context_line(&self) -> String {
        if self.keywords.is_empty() {
            format!("主题主体: {}", self.subject)
        } else {
            format!("主题主体: {}；风格关键词: {}", self.subject, self.keywords.join(", "))
        }
    }
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "subject": {
                "type": "string",
                "description": "主题的视觉主体，2-5 个英文单词"
            },
            "keywords": {
                "type": "array",
                "items": {"type": "string"},
                "description": "风格关键词，英文小写"
            }
        },
        "required": ["subject", "keywords"],
        "additionalProperties": false
    })
}

/// 执行关键词提取管线。
pub async fn extract(llm: &LlmClient, prompt: &str) -> Result<KeywordPlan, LlmError> {
    let out = llm
        .structured("theme_keywords", SYSTEM_PROMPT, prompt, schema())
        .await?;

    let subject = out
        .get("subject")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(prompt.trim())
        .to_string();

    let mut seen = std::collections::HashSet::new();
    let keywords: Vec<String> = out
        .get("keywords")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .filter(|s| seen.insert(s.clone()))
                .take(MAX_KEYWORDS)
                .collect()
        })
        .unwrap_or_default();

    Ok(KeywordPlan { subject, keywords })
}
