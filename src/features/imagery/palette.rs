use std::collections::HashMap;

use image::RgbaImage;

/// 量化位移：每通道保留高 4 位，共 4096 个桶
const QUANT_SHIFT: u8 = 4;
/// 近透明像素不参与统计
const MIN_ALPHA: u8 = 128;

/// 从拼贴图中提取主色。
///
/// 做法：把像素按每通道 4 位量化进桶，按桶内像素数取前 K 个桶，
/// 再用桶内均值还原颜色，输出 `#rrggbb`（按占比降序）。
pub fn extract_palette(img: &RgbaImage, k: usize) -> Vec<String> {
    if k == 0 {
        return Vec::new();
    }

    #[derive(Default)]
    struct Bucket {
        count: u64,
        r: u64,
        g: u64,
        b: u64,
    }

    let mut buckets: HashMap<u16, Bucket> = HashMap::new();
    for pixel in img.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < MIN_ALPHA {
            continue;
        }
        let key = (u16::from(r >> QUANT_SHIFT) << 8)
            | (u16::from(g >> QUANT_SHIFT) << 4)
            | u16::from(b >> QUANT_SHIFT);
        let bucket = buckets.entry(key).or_default();
        bucket.count += 1;
        bucket.r += u64::from(r);
        bucket.g += u64::from(g);
        bucket.b += u64::from(b);
    }

    let mut ranked: Vec<(u16, Bucket)> = buckets.into_iter().collect();
    // 按占比降序；数量相同时按桶键排序，保证输出确定
    ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(k)
        .map(|(_, bucket)| {
            let r = (bucket.r / bucket.count) as u8;
            let g = (bucket.g / bucket.count) as u8;
            let b = (bucket.b / bucket.count) as u8;
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::extract_palette;
    use image::{Rgba, RgbaImage};

    #[test]
    fn dominant_color_ranks_first() {
        // 3/4 红、1/4 蓝
        let mut img = RgbaImage::from_pixel(16, 16, Rgba([200, 16, 16, 255]));
        for y in 0..8 {
            for x in 0..8 {
                img.put_pixel(x, y, Rgba([16, 16, 200, 255]));
            }
        }

        let palette = extract_palette(&img, 2);
        assert_eq!(palette, vec!["#c81010".to_string(), "#1010c8".to_string()]);
    }

    #[test]
    fn transparent_pixels_are_ignored() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255]));
        for x in 0..8 {
            img.put_pixel(x, 0, Rgba([255, 0, 0, 0]));
        }

        let palette = extract_palette(&img, 4);
        assert_eq!(palette, vec!["#00ff00".to_string()]);
    }

    #[test]
    fn k_zero_returns_empty() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        assert!(extract_palette(&img, 0).is_empty());
    }

    #[test]
    fn bucket_average_smooths_nearby_shades() {
        // 同一个桶内的两个相近色应合并为均值
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0xa0, 0x40, 0x40, 255]));
        img.put_pixel(1, 0, Rgba([0xaf, 0x4f, 0x4f, 255]));

        let palette = extract_palette(&img, 4);
        assert_eq!(palette, vec!["#a74747".to_string()]);
    }
}
