use serde::Serialize;
use serde_json::{Value, json};

use crate::config::ThemeConfig;
use crate::error::LlmError;
use crate::features::llm::LlmClient;

use super::{UiChangeMap, keywords::KeywordPlan};

const SYSTEM_PROMPT: &str = "你是一个 UI 字体顾问。根据主题描述推荐一款 Google Fonts \
上可用的英文字体，并给出合理的通用回退字族。display/手写类字体只用于强调场景时\
也要保证正文可读。";

/// 字体管线产物：字族信息 + 样式表地址
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FontAssets {
    /// 首选字族名
    #[schema(example = "Press Start 2P")]
    pub family: String,
    /// 完整的 font-family 栈（含回退）
    #[schema(example = "\"Press Start 2P\", monospace")]
    pub stack: String,
    /// 字体样式表地址（主 CDN 或回退 CDN）
    pub stylesheet_url: String,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "family": {
                "type": "string",
                "description": "Google Fonts 字族名，原样大小写"
            },
            "fallbacks": {
                "type": "array",
                "items": {"type": "string"},
                "description": "回退字族，最后一项应为通用字族（serif/sans-serif/monospace）"
            }
        },
        "required": ["family", "fallbacks"],
        "additionalProperties": false
    })
}

/// 拼出样式表地址：模板中的 {family} 替换为 `+` 连接的字族名。
fn stylesheet_url(template: &str, family: &str) -> String {
    template.replace("{family}", &family.replace(' ', "+"))
}

/// 探测主 CDN 样式表是否可达；失败时切换到备用 CDN（唯一的回退策略）。
async fn resolve_stylesheet(config: &ThemeConfig, family: &str) -> String {
    let primary = stylesheet_url(&config.font_css_url, family);

    let reachable = match crate::http::client_default() {
        Ok(client) => match client.head(&primary).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(family, "主字体 CDN 探测失败: {}", e);
                false
            }
        },
        Err(e) => {
            tracing::debug!("初始化 HTTP Client 失败: {}", e);
            false
        }
    };

    if reachable {
        primary
    } else {
        let fallback = stylesheet_url(&config.font_css_fallback_url, family);
        tracing::warn!(family, "主字体 CDN 不可达，使用备用 CDN");
        fallback
    }
}

fn build_stack(family: &str, fallbacks: &[String]) -> String {
    let mut parts = vec![format!("\"{}\"", family)];
    for fb in fallbacks {
        let fb = fb.trim();
        if fb.is_empty() {
            continue;
        }
        // 通用字族不加引号，具体字族加引号
        if matches!(
            fb,
            "serif" | "sans-serif" | "monospace" | "cursive" | "fantasy" | "system-ui"
        ) {
            parts.push(fb.to_string());
        } else {
            parts.push(format!("\"{}\"", fb));
        }
    }
    if parts.len() == 1 {
        parts.push("sans-serif".to_string());
    }
    parts.join(", ")
}

/// 执行字体管线，返回字体相关 UI 变更片段与字体资产。
pub async fn generate(
    llm: &LlmClient,
    config: &ThemeConfig,
    plan: &KeywordPlan,
) -> Result<(UiChangeMap, FontAssets), LlmError> {
    let out = llm
        .structured("theme_font", SYSTEM_PROMPT, &plan.context_line(), schema())
        .await?;

    let family = out
        .get("family")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::Json("字体管线缺少 family".to_string()))?
        .to_string();

    let fallbacks: Vec<String> = out
        .get("fallbacks")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let stack = build_stack(&family, &fallbacks);
    let stylesheet = resolve_stylesheet(config, &family).await;

    let mut map = UiChangeMap::new();
    map.insert("--font-family".to_string(), stack.clone());

    Ok((
        map,
        FontAssets {
            family,
            stack,
            stylesheet_url: stylesheet,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::{build_stack, stylesheet_url};

    #[test]
    fn stylesheet_url_joins_family_with_plus() {
        let url = stylesheet_url(
            "https://fonts.googleapis.com/css2?family={family}&display=swap",
            "Press Start 2P",
        );
        assert_eq!(
            url,
            "https://fonts.googleapis.com/css2?family=Press+Start+2P&display=swap"
        );
    }

    #[test]
    fn stack_quotes_families_but_not_generic_ones() {
        let stack = build_stack(
            "Press Start 2P",
            &["Courier New".to_string(), "monospace".to_string()],
        );
        assert_eq!(stack, "\"Press Start 2P\", \"Courier New\", monospace");
    }

    #[test]
    fn stack_appends_generic_family_when_missing() {
        assert_eq!(build_stack("Inter", &[]), "\"Inter\", sans-serif");
    }
}
