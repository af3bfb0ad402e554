use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式
    pub format: String,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    /// 是否允许携带凭证（Cookie/Authorization）
    #[serde(default = "CorsConfig::default_allow_credentials")]
    pub allow_credentials: bool,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        false
    }

    fn default_allow_credentials() -> bool {
        false
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            allow_credentials: Self::default_allow_credentials(),
            max_age_secs: None,
        }
    }
}

/// LLM API 配置（OpenAI 兼容的 chat completions 端点）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API Base URL（不含 /chat/completions）
    #[serde(default = "LlmConfig::default_base_url")]
    pub base_url: String,
    /// API Key（建议通过 APP_LLM_API_KEY 注入）
    #[serde(default, alias = "api-key", alias = "apiKey")]
    pub api_key: String,
    /// 模型名称
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,
    /// 采样温度
    #[serde(default = "LlmConfig::default_temperature")]
    pub temperature: f32,
    /// 单次响应的输出 token 上限
    #[serde(default = "LlmConfig::default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl LlmConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }
    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }
    fn default_temperature() -> f32 {
        0.7
    }
    fn default_max_output_tokens() -> u32 {
        1024
    }

    /// chat completions 端点完整地址
    pub fn completions_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_key: String::new(),
            model: Self::default_model(),
            temperature: Self::default_temperature(),
            max_output_tokens: Self::default_max_output_tokens(),
        }
    }
}

/// 图像获取配置（搜索 + 拼贴 + 取色）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageryConfig {
    /// 是否启用图像参考管线（关闭后色彩管线不带取色提示）
    #[serde(default = "ImageryConfig::default_enabled")]
    pub enabled: bool,
    /// 图片搜索端点（{query} 会被替换为 URL 编码后的关键词）
    #[serde(default = "ImageryConfig::default_search_endpoint")]
    pub search_endpoint: String,
    /// 抓取搜索页使用的 User-Agent
    #[serde(default = "ImageryConfig::default_user_agent")]
    pub user_agent: String,
    /// 从搜索页提取的候选地址上限
    #[serde(default = "ImageryConfig::default_max_candidates")]
    pub max_candidates: usize,
    /// 参与拼贴的图片数量
    #[serde(default = "ImageryConfig::default_collage_images")]
    pub collage_images: usize,
    /// 拼贴小图边长（像素，正方形）
    #[serde(default = "ImageryConfig::default_tile_edge")]
    pub tile_edge: u32,
    /// 拼贴列数
    #[serde(default = "ImageryConfig::default_columns")]
    pub columns: u32,
    /// 提取的主色数量
    #[serde(default = "ImageryConfig::default_palette_size")]
    pub palette_size: usize,
    /// 并发拼贴许可数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_parallel: u32,
}

impl ImageryConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_search_endpoint() -> String {
        "https://www.bing.com/images/search?q={query}&form=HDRSC2&first=1".to_string()
    }
    fn default_user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/124.0 Safari/537.36"
            .to_string()
    }
    fn default_max_candidates() -> usize {
        16
    }
    fn default_collage_images() -> usize {
        4
    }
    fn default_tile_edge() -> u32 {
        128
    }
    fn default_columns() -> u32 {
        2
    }
    fn default_palette_size() -> usize {
        6
    }
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            search_endpoint: Self::default_search_endpoint(),
            user_agent: Self::default_user_agent(),
            max_candidates: Self::default_max_candidates(),
            collage_images: Self::default_collage_images(),
            tile_edge: Self::default_tile_edge(),
            columns: Self::default_columns(),
            palette_size: Self::default_palette_size(),
            max_parallel: 0,
        }
    }
}

/// 主题生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// 提示词最大长度（字符数）
    #[serde(default = "ThemeConfig::default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    /// 是否启用主题响应缓存
    #[serde(default = "ThemeConfig::default_cache_enabled")]
    pub cache_enabled: bool,
    /// 缓存最大条目数
    #[serde(default = "ThemeConfig::default_cache_max_entries")]
    pub cache_max_entries: u64,
    /// 缓存 TTL（秒）
    #[serde(default = "ThemeConfig::default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// 缓存 TTI（秒）
    #[serde(default = "ThemeConfig::default_cache_tti")]
    pub cache_tti_secs: u64,
    /// 字体样式表主 CDN（{family} 会被替换为 URL 编码后的字体族名）
    #[serde(default = "ThemeConfig::default_font_css_url")]
    pub font_css_url: String,
    /// 字体样式表备用 CDN（主 CDN 探测失败时使用，唯一的回退策略）
    #[serde(default = "ThemeConfig::default_font_css_fallback_url")]
    pub font_css_fallback_url: String,
}

impl ThemeConfig {
    fn default_max_prompt_chars() -> usize {
        256
    }
    fn default_cache_enabled() -> bool {
        true
    }
    fn default_cache_max_entries() -> u64 {
        512
    }
    fn default_cache_ttl() -> u64 {
        3600
    }
    fn default_cache_tti() -> u64 {
        900
    }
    fn default_font_css_url() -> String {
        "https://fonts.googleapis.com/css2?family={family}&display=swap".to_string()
    }
    fn default_font_css_fallback_url() -> String {
        "https://fonts.bunny.net/css?family={family}&display=swap".to_string()
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: Self::default_max_prompt_chars(),
            cache_enabled: Self::default_cache_enabled(),
            cache_max_entries: Self::default_cache_max_entries(),
            cache_ttl_secs: Self::default_cache_ttl(),
            cache_tti_secs: Self::default_cache_tti(),
            font_css_url: Self::default_font_css_url(),
            font_css_fallback_url: Self::default_font_css_fallback_url(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    /// CORS 配置
    #[serde(default)]
    pub cors: CorsConfig,
    /// LLM API 配置
    #[serde(default)]
    pub llm: LlmConfig,
    /// 图像获取配置
    #[serde(default)]
    pub imagery: ImageryConfig,
    /// 主题生成配置
    #[serde(default)]
    pub theme: ThemeConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            // 加载配置文件
            .add_source(File::with_name(config_path.to_str().unwrap()))
            // 支持环境变量覆盖，例如：APP_API_PREFIX / APP_LLM_API_KEY
            .add_source(
                Environment::with_prefix("APP")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = builder.try_deserialize()?;

        // 调试：打印 api_key 配置状态（只暴露前缀，避免泄露）
        tracing::debug!(
            "配置加载完成: llm.api_key = {:?}",
            (!config.llm.api_key.is_empty())
                .then(|| format!("{}...", &config.llm.api_key[..config.llm.api_key.len().min(4)]))
        );

        Ok(config)
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3900,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "full".to_string(),
            },
            api: ApiConfig {
                prefix: "/api/v1".to_string(),
            },
            cors: CorsConfig::default(),
            llm: LlmConfig::default(),
            imagery: ImageryConfig::default(),
            theme: ThemeConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
    /// 是否启用强制退出
    #[serde(default = "ShutdownConfig::default_force")]
    pub force_quit: bool,
    /// 强制退出前的等待时间（秒）
    #[serde(default = "ShutdownConfig::default_force_delay")]
    pub force_delay_secs: u64,
    /// Linux systemd 看门狗配置
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }
    fn default_force() -> bool {
        true
    }
    fn default_force_delay() -> u64 {
        10
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// 获取强制退出等待时间
    pub fn force_delay_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.force_delay_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
            force_quit: Self::default_force(),
            force_delay_secs: Self::default_force_delay(),
            watchdog: WatchdogConfig::default(),
        }
    }
}

/// systemd 看门狗配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// 是否启用看门狗
    #[serde(default = "WatchdogConfig::default_enabled")]
    pub enabled: bool,
    /// 看门狗超时时间（秒）
    #[serde(default = "WatchdogConfig::default_timeout")]
    pub timeout_secs: u64,
    /// 心跳间隔时间（秒）
    #[serde(default = "WatchdogConfig::default_interval")]
    pub interval_secs: u64,
}

impl WatchdogConfig {
    fn default_enabled() -> bool {
        false
    }
    fn default_timeout() -> u64 {
        60
    }
    fn default_interval() -> u64 {
        10
    }

    /// 获取心跳间隔时间
    pub fn interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            timeout_secs: Self::default_timeout(),
            interval_secs: Self::default_interval(),
        }
    }
}
