//! 生成管线
//!
//! 每条管线负责一类主题产物：构造 prompt + JSON Schema，调用 LLM 客户端，
//! 把结构化输出归一化为 UI 变更片段（CSS 自定义属性映射）或字符串。

/// 色彩管线
pub mod color;
/// 字体管线
pub mod font;
/// 关键词提取管线
pub mod keywords;
/// 布局管线
pub mod layout;
/// 问候语管线
pub mod text;

use std::collections::BTreeMap;

use serde_json::Value;

/// UI 变更映射：CSS 自定义属性名 → 值。
///
/// 使用 BTreeMap 保证序列化输出的键序稳定。
pub type UiChangeMap = BTreeMap<String, String>;

/// 把模型输出的 JSON 对象归一化为 UI 变更映射。
///
/// 规则：
/// - 只保留以 `--` 开头的键（CSS 自定义属性）
/// - 值必须是标量：非空字符串直接保留，数字/布尔转为字符串
/// - 嵌套对象/数组/null 丢弃
pub fn normalize_ui_changes(value: &Value) -> UiChangeMap {
    let mut map = UiChangeMap::new();
    let Some(obj) = value.as_object() else {
        return map;
    };

    for (key, val) in obj {
        if !key.starts_with("--") {
            continue;
        }
        let rendered = match val {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    continue;
                }
                trimmed.to_string()
            }
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        map.insert(key.clone(), rendered);
    }
    map
}

/// 按顺序合并多个 UI 变更片段，后写入的管线在键冲突时覆盖先写入的。
pub fn merge_ui_changes<I>(parts: I) -> UiChangeMap
where
    I: IntoIterator<Item = UiChangeMap>,
{
    let mut merged = UiChangeMap::new();
    for part in parts {
        merged.extend(part);
    }
    merged
}

/// CSS 颜色值的宽松校验：`#rgb` / `#rrggbb`。
///
/// 模型偶尔会吐出颜色名或 rgb() 形式，统一丢弃，保持输出可预测。
pub(crate) fn is_hex_color(value: &str) -> bool {
    let Some(body) = value.strip_prefix('#') else {
        return false;
    };
    (body.len() == 3 || body.len() == 6) && body.bytes().all(|b| b.is_ascii_hexdigit())
}
