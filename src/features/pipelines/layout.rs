use serde_json::{Value, json};

use crate::error::LlmError;
use crate::features::llm::LlmClient;

use super::{UiChangeMap, keywords::KeywordPlan, normalize_ui_changes};

const SYSTEM_PROMPT: &str = "你是一个 UI 布局设计师。根据主题描述给出布局参数：\
圆角、间距、内容宽度、边框粗细与密度档位。数值取整数像素。";

/// 数值参数的合法区间（越界值会被收紧而不是丢弃）
const RADIUS_RANGE: (i64, i64) = (0, 32);
const SPACING_RANGE: (i64, i64) = (2, 48);
const CONTENT_WIDTH_RANGE: (i64, i64) = (480, 1920);
const BORDER_WIDTH_RANGE: (i64, i64) = (0, 8);

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "corner_radius_px": {"type": "integer", "description": "组件圆角（像素）"},
            "spacing_px": {"type": "integer", "description": "基础间距（像素）"},
            "content_max_width_px": {"type": "integer", "description": "内容区最大宽度（像素）"},
            "border_width_px": {"type": "integer", "description": "边框粗细（像素）"},
            "density": {
                "type": "string",
                "enum": ["compact", "comfortable", "spacious"],
                "description": "整体密度档位"
            }
        },
        "required": [
            "corner_radius_px",
            "spacing_px",
            "content_max_width_px",
            "border_width_px",
            "density"
        ],
        "additionalProperties": false
    })
}

fn clamp_px(value: Option<&Value>, range: (i64, i64)) -> Option<i64> {
    value.and_then(Value::as_i64).map(|v| v.clamp(range.0, range.1))
}

/// 执行布局管线，返回布局相关 UI 变更片段。
pub async fn generate(llm: &LlmClient, plan: &KeywordPlan) -> Result<UiChangeMap, LlmError> {
    let out = llm
        .structured("theme_layout", SYSTEM_PROMPT, &plan.context_line(), schema())
        .await?;

    // 数值收紧到合法区间后映射为 CSS 自定义属性，最后统一走归一化
    let mut raw = serde_json::Map::new();

    if let Some(v) = clamp_px(out.get("corner_radius_px"), RADIUS_RANGE) {
        raw.insert("--radius".to_string(), Value::String(format!("{v}px")));
    }
    if let Some(v) = clamp_px(out.get("spacing_px"), SPACING_RANGE) {
        raw.insert("--spacing".to_string(), Value::String(format!("{v}px")));
    }
    if let Some(v) = clamp_px(out.get("content_max_width_px"), CONTENT_WIDTH_RANGE) {
        raw.insert(
            "--content-max-width".to_string(),
            Value::String(format!("{v}px")),
        );
    }
    if let Some(v) = clamp_px(out.get("border_width_px"), BORDER_WIDTH_RANGE) {
        raw.insert("--border-width".to_string(), Value::String(format!("{v}px")));
    }
    if let Some(density) = out.get("density").and_then(Value::as_str)
        && matches!(density, "compact" | "comfortable" | "spacious")
    {
        raw.insert("--density".to_string(), Value::String(density.to_string()));
    }
    let map: UiChangeMap = normalize_ui_changes(&Value::Object(raw));

    if map.is_empty() {
        return Err(LlmError::Json("布局管线没有产出合法参数".to_string()));
    }
    Ok(map)
}
