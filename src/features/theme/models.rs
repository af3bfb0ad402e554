use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::pipelines::UiChangeMap;
use crate::features::pipelines::font::FontAssets;

/// 主题生成请求
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[schema(example = json!({"prompt": "Mario theme"}))]
pub struct ThemeRequest {
    /// 主题描述（自然语言，如 "Mario theme"）
    pub prompt: String,
}

/// 单条管线降级记录
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineWarning {
    /// 管线名：keywords / imagery / color / font / layout / text
    #[schema(example = "imagery")]
    pub pipeline: String,
    /// 失败原因（人类可读）
    pub detail: String,
}

impl PipelineWarning {
    pub fn new(pipeline: &str, detail: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            detail: detail.into(),
        }
    }
}

/// 主题生成响应
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
  "subject": "super mario",
  "keywords": ["retro", "pixel art"],
  "uiChanges": {"--color-background": "#fbd000", "--font-family": "\"Press Start 2P\", monospace"},
  "greeting": "It's-a me! Welcome to the Mushroom Kingdom!",
  "palette": ["#e60012", "#fbd000"],
  "warnings": [],
  "cached": false
}))]
pub struct ThemeResponse {
    /// 主题的视觉主体
    pub subject: String,
    /// 提取出的风格关键词
    pub keywords: Vec<String>,
    /// 合并后的 UI 变更映射（CSS 自定义属性 → 值）
    pub ui_changes: UiChangeMap,
    /// 主题风格的欢迎语（text 管线失败时缺省）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    /// 字体资产（font 管线失败时缺省）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<FontAssets>,
    /// 拼贴取色得到的参考调色板（图像管线失败或禁用时为空）
    pub palette: Vec<String>,
    /// 降级记录：哪些管线失败、为何失败
    pub warnings: Vec<PipelineWarning>,
    /// 生成时间（RFC3339）
    #[schema(value_type = String)]
    pub generated_at: DateTime<Utc>,
    /// 是否来自缓存
    pub cached: bool,
}
