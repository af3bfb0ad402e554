use serde_json::{Value, json};

use crate::error::LlmError;
use crate::features::imagery::ReferencePalette;
use crate::features::llm::LlmClient;

use super::{UiChangeMap, is_hex_color, keywords::KeywordPlan, normalize_ui_changes};

const SYSTEM_PROMPT: &str = "你是一个 UI 配色师。根据主题描述（以及可选的参考调色板）\
给出一套协调、可读性好的界面配色。所有颜色使用 #rrggbb 十六进制格式，\
保证正文文字与背景的对比度足够。";

/// schema 字段名 → CSS 自定义属性名。
///
/// 字段顺序即写入顺序，schema 固定字段而不是放开任意键，
/// 避免模型发明不存在的属性名。
const COLOR_FIELDS: &[(&str, &str)] = &[
    ("background", "--color-background"),
    ("surface", "--color-surface"),
    ("text", "--color-text"),
    ("muted_text", "--color-text-muted"),
    ("primary", "--color-primary"),
    ("secondary", "--color-secondary"),
    ("accent", "--color-accent"),
    ("border", "--color-border"),
];

fn schema() -> Value {
    let mut properties = serde_json::Map::new();
    for (field, _) in COLOR_FIELDS {
        properties.insert(
            (*field).to_string(),
            json!({"type": "string", "description": "#rrggbb"}),
        );
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": COLOR_FIELDS.iter().map(|(f, _)| *f).collect::<Vec<_>>(),
        "additionalProperties": false
    })
}

fn build_user_prompt(plan: &KeywordPlan, palette: Option<&ReferencePalette>) -> String {
    let mut prompt = plan.context_line();
    if let Some(palette) = palette
        && !palette.colors.is_empty()
    {
        prompt.push_str(&format!(
            "\n参考调色板（取自主题相关图片，按占比降序）: {}\n\
             以参考调色板为基调，必要时调整明度以保证可读性。",
            palette.colors.join(", ")
        ));
    }
    prompt
}

/// 执行色彩管线，返回颜色相关的 UI 变更片段。
pub async fn generate(
    llm: &LlmClient,
    plan: &KeywordPlan,
    palette: Option<&ReferencePalette>,
) -> Result<UiChangeMap, LlmError> {
    let out = llm
        .structured(
            "theme_colors",
            SYSTEM_PROMPT,
            &build_user_prompt(plan, palette),
            schema(),
        )
        .await?;

    // 字段名映射为 CSS 自定义属性，非法颜色值丢弃，最后统一走归一化
    let mut raw = serde_json::Map::new();
    for (field, var) in COLOR_FIELDS {
        let Some(value) = out.get(*field).and_then(Value::as_str) else {
            continue;
        };
        let value = value.trim();
        if is_hex_color(value) {
            raw.insert((*var).to_string(), Value::String(value.to_lowercase()));
        } else {
            tracing::debug!(field, value, "丢弃非法颜色值");
        }
    }
    let map: UiChangeMap = normalize_ui_changes(&Value::Object(raw));

    if map.is_empty() {
        return Err(LlmError::Json("色彩管线没有产出合法颜色".to_string()));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::{COLOR_FIELDS, build_user_prompt, schema};
    use crate::features::imagery::ReferencePalette;
    use crate::features::pipelines::keywords::KeywordPlan;

    #[test]
    fn schema_requires_every_color_field() {
        let s = schema();
        let required = s["required"].as_array().expect("required array");
        assert_eq!(required.len(), COLOR_FIELDS.len());
        assert_eq!(s["additionalProperties"], false);
    }

    #[test]
    fn prompt_includes_reference_palette_when_present() {
        let plan = KeywordPlan::fallback("mario");
        let palette = ReferencePalette {
            colors: vec!["#e60012".to_string(), "#0066cc".to_string()],
            images_used: 4,
        };

        let with = build_user_prompt(&plan, Some(&palette));
        assert!(with.contains("#e60012, #0066cc"));

        let without = build_user_prompt(&plan, None);
        assert!(!without.contains("参考调色板"));
    }
}
