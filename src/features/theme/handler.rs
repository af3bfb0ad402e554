use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

use super::models::{ThemeRequest, ThemeResponse};
use super::orchestrator;

/// 主题响应缓存键：归一化（trim + 小写）后提示词的 SHA-256。
fn cache_key(prompt: &str) -> String {
    let normalized = prompt.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

#[utoipa::path(
    post,
    path = "/theme",
    summary = "按自然语言提示词生成 UI 主题",
    description = "先做关键词提取，再并发执行色彩/字体/布局/问候语四条生成管线，\
合并为一份 UI 变更映射。单条管线失败会记录在 warnings 中而不是使请求失败；\
全部管线失败时返回 502。",
    request_body = ThemeRequest,
    responses(
        (status = 200, description = "生成成功（可能带降级 warnings）", body = ThemeResponse),
        (
            status = 422,
            description = "参数校验错误（prompt 缺失或过长）",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 502,
            description = "上游 LLM 不可用或所有管线失败",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        ),
        (
            status = 504,
            description = "上游请求超时",
            body = crate::error::ProblemDetails,
            content_type = "application/problem+json"
        )
    ),
    tag = "Theme"
)]
pub async fn generate_theme(
    State(state): State<AppState>,
    Json(req): Json<ThemeRequest>,
) -> Result<Json<ThemeResponse>, AppError> {
    let t_total = Instant::now();

    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("缺少 prompt".to_string()));
    }
    let prompt_chars = prompt.chars().count();
    if prompt_chars > state.theme.max_prompt_chars {
        return Err(AppError::Validation(format!(
            "prompt 过长（最大 {} 字符）",
            state.theme.max_prompt_chars
        )));
    }

    let key = cache_key(prompt);
    if state.theme.cache_enabled
        && let Some(hit) = state.theme_cache.get(&key).await
    {
        let mut resp = (*hit).clone();
        resp.cached = true;
        tracing::debug!(
            target: "themegen_backend::theme",
            total_ms = t_total.elapsed().as_millis() as u64,
            "主题缓存命中"
        );
        return Ok(Json(resp));
    }

    let resp = orchestrator::generate_theme(&state, prompt).await?;

    // 只缓存无降级的完整结果，避免把临时故障钉在缓存里
    if state.theme.cache_enabled && resp.warnings.is_empty() {
        state.theme_cache.insert(key, Arc::new(resp.clone())).await;
    }

    tracing::info!(
        target: "themegen_backend::theme",
        total_ms = t_total.elapsed().as_millis() as u64,
        vars = resp.ui_changes.len(),
        warnings = resp.warnings.len(),
        "主题生成完成"
    );

    Ok(Json(resp))
}

pub fn create_theme_router() -> Router<AppState> {
    Router::new().route("/theme", post(generate_theme))
}

#[cfg(test)]
mod tests {
    use super::cache_key;

    #[test]
    fn cache_key_normalizes_case_and_whitespace() {
        assert_eq!(cache_key("Mario Theme"), cache_key("  mario theme  "));
        assert_ne!(cache_key("mario theme"), cache_key("zelda theme"));
    }

    #[test]
    fn cache_key_is_hex_sha256() {
        let key = cache_key("mario");
        assert_eq!(key.len(), 64);
        assert!(key.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
