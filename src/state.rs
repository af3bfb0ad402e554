use std::sync::Arc;

use moka::future::Cache;
use tokio::sync::Semaphore;

use crate::config::{ImageryConfig, ThemeConfig};
use crate::features::llm::LlmClient;
use crate::features::theme::models::ThemeResponse;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<LlmClient>,
    /// 图像获取配置快照（handler 不读全局配置，便于测试注入）
    pub imagery: Arc<ImageryConfig>,
    /// 主题生成配置快照
    pub theme: Arc<ThemeConfig>,
    /// 控制并发拼贴的信号量（限制 CPU 密集型任务数量）
    pub collage_semaphore: Arc<Semaphore>,
    /// 主题响应缓存（键为归一化提示词的 SHA-256）
    pub theme_cache: Cache<String, Arc<ThemeResponse>>,
}
