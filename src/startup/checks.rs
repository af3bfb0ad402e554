use crate::config::AppConfig;
use crate::error::AppError;

/// 执行启动检查
///
/// 1. 校验 LLM 端点配置（地址合法、API Key 存在）
/// 2. 校验拼贴几何参数
/// 3. 预热共享 HTTP Client（提前建立连接池）
pub async fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("开始执行启动检查...");

    check_llm_config(config)?;
    check_imagery_config(config)?;
    warm_http_clients()?;

    tracing::info!("启动检查完成");
    Ok(())
}

/// 校验 LLM 配置：端点必须是合法 URL；缺少 API Key 只告警不阻断
/// （本地/代理部署可能不需要鉴权）。
fn check_llm_config(config: &AppConfig) -> Result<(), AppError> {
    let endpoint = config.llm.completions_endpoint();
    reqwest::Url::parse(&endpoint)
        .map_err(|e| AppError::Internal(format!("LLM 端点地址非法 {endpoint}: {e}")))?;

    if config.llm.api_key.is_empty() {
        tracing::warn!("llm.api_key 为空（可通过 APP_LLM_API_KEY 注入）");
    }
    tracing::info!("LLM 端点: {}，模型: {}", endpoint, config.llm.model);
    Ok(())
}

/// 校验拼贴几何参数，避免运行期才发现 0 尺寸画布。
fn check_imagery_config(config: &AppConfig) -> Result<(), AppError> {
    let imagery = &config.imagery;
    if !imagery.enabled {
        tracing::info!("图像参考管线已禁用，色彩管线将不带取色提示");
        return Ok(());
    }

    if imagery.tile_edge == 0 || imagery.columns == 0 || imagery.collage_images == 0 {
        return Err(AppError::Internal(
            "imagery 配置非法：tile_edge/columns/collage_images 均需大于 0".to_string(),
        ));
    }
    if !imagery.search_endpoint.contains("{query}") {
        return Err(AppError::Internal(
            "imagery.search_endpoint 缺少 {query} 占位符".to_string(),
        ));
    }
    if imagery.collage_images > imagery.max_candidates {
        tracing::warn!(
            "collage_images({}) 大于 max_candidates({})，拼贴可能取不满",
            imagery.collage_images,
            imagery.max_candidates
        );
    }
    Ok(())
}

/// 预热共享 HTTP Client，初始化失败时尽早暴露。
fn warm_http_clients() -> Result<(), AppError> {
    crate::http::client_default()
        .map_err(|e| AppError::Internal(format!("初始化 HTTP Client 失败: {e}")))?;
    crate::http::client_timeout_30s()
        .map_err(|e| AppError::Internal(format!("初始化 HTTP Client 失败: {e}")))?;
    crate::http::client_timeout_90s()
        .map_err(|e| AppError::Internal(format!("初始化 HTTP Client 失败: {e}")))?;
    Ok(())
}
