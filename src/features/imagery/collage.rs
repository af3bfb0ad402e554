use futures_util::{StreamExt, stream};
use image::RgbaImage;

use crate::config::ImageryConfig;
use crate::error::ImageryError;

/// 单张图片的下载大小上限，超过即放弃该候选
const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;
/// 图片下载并发数
const FETCH_CONCURRENCY: usize = 4;

/// 并发下载候选图片，拿到足够数量的可用图片后停止。
///
/// 单个候选失败（网络错误、非 2xx、超大）只是跳过，不影响整体。
pub async fn fetch_tiles(config: &ImageryConfig, urls: &[String]) -> Vec<Vec<u8>> {
    let want = config.collage_images.max(1);
    let user_agent = config.user_agent.clone();

    stream::iter(urls.iter().cloned())
        .map(|url| {
            let user_agent = user_agent.clone();
            async move {
                match fetch_one(&url, &user_agent).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        tracing::debug!("候选图片下载失败 {}: {}", url, e);
                        None
                    }
                }
            }
        })
        .buffer_unordered(FETCH_CONCURRENCY)
        .filter_map(|r| async move { r })
        .take(want)
        .collect()
        .await
}

async fn fetch_one(url: &str, user_agent: &str) -> Result<Vec<u8>, ImageryError> {
    let client = crate::http::client_timeout_30s()
        .map_err(|e| ImageryError::Network(format!("初始化 HTTP Client 失败: {}", e)))?;

    let resp = client
        .get(url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ImageryError::Network(format!(
            "图床返回 HTTP {}",
            status.as_u16()
        )));
    }

    let bytes = resp.bytes().await?;
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageryError::Decode(format!(
            "图片过大: {} bytes",
            bytes.len()
        )));
    }

    Ok(bytes.to_vec())
}

/// 将若干图片缩放为正方形小图并拼接为网格拼贴。
///
/// 解码失败的图片被跳过；全部失败时返回错误。
/// 网格行数按实际可用图片数量向上取整，最后一行不足时留空白格。
pub fn stitch_collage(
    images: &[Vec<u8>],
    tile_edge: u32,
    columns: u32,
) -> Result<RgbaImage, ImageryError> {
    let tile_edge = tile_edge.max(8);
    let columns = columns.max(1);

    let tiles: Vec<RgbaImage> = images
        .iter()
        .filter_map(|raw| match image::load_from_memory(raw) {
            Ok(img) => Some(img.thumbnail_exact(tile_edge, tile_edge).to_rgba8()),
            Err(e) => {
                tracing::debug!("拼贴图片解码失败: {}", e);
                None
            }
        })
        .collect();

    if tiles.is_empty() {
        return Err(ImageryError::Decode("没有可解码的图片".to_string()));
    }

    let (cols, rows) = grid_dimensions(tiles.len(), columns);
    let mut canvas = RgbaImage::new(cols * tile_edge, rows * tile_edge);

    for (i, tile) in tiles.iter().enumerate() {
        let x = (i as u32 % cols) * tile_edge;
        let y = (i as u32 / cols) * tile_edge;
        image::imageops::replace(&mut canvas, tile, i64::from(x), i64::from(y));
    }

    Ok(canvas)
}

/// 计算拼贴网格的实际列数与行数
fn grid_dimensions(tile_count: usize, columns: u32) -> (u32, u32) {
    let count = tile_count as u32;
    let cols = columns.min(count).max(1);
    let rows = count.div_ceil(cols);
    (cols, rows)
}
