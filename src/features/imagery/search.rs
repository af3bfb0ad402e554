use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;

use crate::config::ImageryConfig;
use crate::error::ImageryError;

/// 搜索结果页中图片原始地址的提取模式。
///
/// Bing 图片搜索把每条结果的元数据以 HTML 转义的 JSON 塞在 `m="..."` 属性里，
/// 其中 `murl` 字段是原图地址。先把 `&quot;` 还原为引号再匹配。
static MURL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""murl":"(https?://[^"]+)""#).expect("murl regex"));

/// 抓取搜索结果页并提取候选图片地址。
///
/// 返回值：去重后的原图 URL，数量不超过 `max_candidates`，顺序已随机化，
/// 避免重复请求总是打到同一批图床。
pub async fn search_image_urls(
    config: &ImageryConfig,
    query: &str,
) -> Result<Vec<String>, ImageryError> {
    let url = config
        .search_endpoint
        .replace("{query}", &urlencoding::encode(query));

    tracing::debug!(query, "抓取图片搜索页");

    let client = crate::http::client_timeout_30s()
        .map_err(|e| ImageryError::Network(format!("初始化 HTTP Client 失败: {}", e)))?;

    let resp = client
        .get(&url)
        .header(reqwest::header::USER_AGENT, &config.user_agent)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ImageryError::Network(format!(
            "搜索页返回 HTTP {}",
            status.as_u16()
        )));
    }

    let body = resp.text().await?;
    let mut urls = extract_image_urls(&body, config.max_candidates);
    urls.shuffle(&mut rand::thread_rng());
    Ok(urls)
}

/// 从结果页 HTML 中提取图片原始地址（去重、保序、限量）。
pub(crate) fn extract_image_urls(html: &str, limit: usize) -> Vec<String> {
    let unescaped = html.replace("&quot;", "\"").replace("&amp;", "&");

    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for cap in MURL_RE.captures_iter(&unescaped) {
        let Some(m) = cap.get(1) else { continue };
        let url = m.as_str();
        // 跳过明显不是位图的资源
        if url.ends_with(".svg") || url.ends_with(".gif") {
            continue;
        }
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
        if urls.len() >= limit {
            break;
        }
    }
    urls
}
