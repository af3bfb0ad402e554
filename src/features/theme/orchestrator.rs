//! 多管线编排
//!
//! 每个请求：先做关键词提取，然后色彩/字体/布局/问候语四条管线扁平并发，
//! 全部结束后合并结果。单条管线失败记为降级，不影响整体；
//! 只有全部管线都失败时才返回错误。

use chrono::Utc;

use crate::error::AppError;
use crate::features::imagery;
use crate::features::pipelines::{color, font, keywords, layout, merge_ui_changes, text};
use crate::state::AppState;

use super::models::{PipelineWarning, ThemeResponse};

/// 执行一次完整的主题生成。
pub async fn generate_theme(state: &AppState, prompt: &str) -> Result<ThemeResponse, AppError> {
    let mut warnings = Vec::new();

    // 阶段一：关键词提取。失败时降级为用原始提示词当主体。
    let plan = match keywords::extract(&state.llm_client, prompt).await {
        Ok(plan) => plan,
        Err(e) => {
            tracing::warn!("关键词提取失败，降级使用原始提示词: {}", e);
            warnings.push(PipelineWarning::new("keywords", e.to_string()));
            keywords::KeywordPlan::fallback(prompt)
        }
    };

    // 阶段二：扁平 fan-out。色彩管线内部先构建参考调色板（同样可降级）。
    let color_task = async {
        let mut imagery_warning = None;
        let palette = if state.imagery.enabled {
            match imagery::build_reference_palette(
                &state.imagery,
                &state.collage_semaphore,
                &plan.search_query(),
            )
            .await
            {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("参考调色板构建失败，色彩管线不带取色提示: {}", e);
                    imagery_warning = Some(PipelineWarning::new("imagery", e.to_string()));
                    None
                }
            }
        } else {
            None
        };
        let result = color::generate(&state.llm_client, &plan, palette.as_ref()).await;
        (palette, imagery_warning, result)
    };
    let font_task = font::generate(&state.llm_client, &state.theme, &plan);
    let layout_task = layout::generate(&state.llm_client, &plan);
    let text_task = text::generate(&state.llm_client, &plan);

    let ((palette, imagery_warning, color_res), font_res, layout_res, text_res) =
        tokio::join!(color_task, font_task, layout_task, text_task);

    // 阶段三：收敛。失败的管线记为降级，成功的按 color → font → layout 顺序合并。
    if let Some(w) = imagery_warning {
        warnings.push(w);
    }

    let mut succeeded = 0usize;
    let color_part = collect(color_res, "color", &mut warnings, &mut succeeded);
    let font_out = collect(font_res, "font", &mut warnings, &mut succeeded);
    let layout_part = collect(layout_res, "layout", &mut warnings, &mut succeeded);
    let greeting = collect(text_res, "text", &mut warnings, &mut succeeded);

    if succeeded == 0 {
        return Err(AppError::Generation("所有生成管线均失败".to_string()));
    }

    let (font_part, font_assets) = match font_out {
        Some((map, assets)) => (Some(map), Some(assets)),
        None => (None, None),
    };
    let ui_changes =
        merge_ui_changes([color_part, font_part, layout_part].into_iter().flatten());

    Ok(ThemeResponse {
        subject: plan.subject,
        keywords: plan.keywords,
        ui_changes,
        greeting,
        font: font_assets,
        palette: palette.map(|p| p.colors).unwrap_or_default(),
        warnings,
        generated_at: Utc::now(),
        cached: false,
    })
}

/// 管线结果收敛：成功计数并返回产物，失败登记降级记录。
fn collect<T, E: std::fmt::Display>(
    result: Result<T, E>,
    pipeline: &str,
    warnings: &mut Vec<PipelineWarning>,
    succeeded: &mut usize,
) -> Option<T> {
    match result {
        Ok(value) => {
            *succeeded += 1;
            Some(value)
        }
        Err(e) => {
            tracing::warn!(pipeline, "管线失败: {}", e);
            warnings.push(PipelineWarning::new(pipeline, e.to_string()));
            None
        }
    }
}
