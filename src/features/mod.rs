/// 图像获取（搜索 / 拼贴 / 取色）
pub mod imagery;
/// LLM 客户端
pub mod llm;
/// 生成管线
pub mod pipelines;
/// 主题编排与 HTTP 接口
pub mod theme;
