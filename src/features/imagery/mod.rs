/// 拼贴构建（下载 + 缩放 + 拼接）
pub mod collage;
/// 主色提取
pub mod palette;
/// 图片搜索页抓取
pub mod search;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::ImageryConfig;
use crate::error::ImageryError;

/// 色彩管线的图像参考：拼贴取色结果
#[derive(Debug, Clone)]
pub struct ReferencePalette {
    /// 主色列表（#rrggbb，按占比降序）
    pub colors: Vec<String>,
    /// 实际参与拼贴的图片数量
    pub images_used: usize,
}

/// 按关键词构建参考调色板：搜索 → 下载 → 拼贴 → 取色。
///
/// 拼贴/取色是 CPU 密集操作，放到 blocking 线程池执行，
/// 并由 `semaphore` 限制并发数量。
pub async fn build_reference_palette(
    config: &ImageryConfig,
    semaphore: &Arc<Semaphore>,
    query: &str,
) -> Result<ReferencePalette, ImageryError> {
    let urls = search::search_image_urls(config, query).await?;
    if urls.is_empty() {
        return Err(ImageryError::NoResults);
    }

    let tiles = collage::fetch_tiles(config, &urls).await;
    if tiles.is_empty() {
        return Err(ImageryError::NoResults);
    }

    let permit = semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ImageryError::Collage(format!("获取拼贴许可失败: {}", e)))?;

    let tile_edge = config.tile_edge;
    let columns = config.columns;
    let palette_size = config.palette_size;
    let images_total = tiles.len();

    let colors = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let canvas = collage::stitch_collage(&tiles, tile_edge, columns)?;
        Ok::<_, ImageryError>(palette::extract_palette(&canvas, palette_size))
    })
    .await
    .map_err(|e| ImageryError::Collage(format!("拼贴任务 join 失败: {}", e)))??;

    tracing::debug!(
        images = images_total,
        colors = colors.len(),
        "参考调色板构建完成"
    );

    Ok(ReferencePalette {
        colors,
        images_used: images_total,
    })
}
