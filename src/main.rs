use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::StatusCode, response::Json, routing::get};
use moka::future::Cache;
use serde_json::json;
use themegen_backend::cors::build_cors_layer;
use themegen_backend::features::llm::LlmClient;
use themegen_backend::features::theme::{self, models::ThemeResponse};
use themegen_backend::startup::run_startup_checks;
use themegen_backend::state::AppState;
use themegen_backend::{AppError, ShutdownManager, SystemdWatchdog, config::AppConfig};
use tokio::sync::Semaphore;
use tower_http::compression::CompressionLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    // 压缩策略：明确排除不该压缩的响应，其余（JSON/文本）默认压缩。
    //
    // - SSE/流式响应：压缩可能引入缓冲，影响实时性。
    // - 图片等：本身已压缩或收益极低，反而浪费 CPU。
    // - application/octet-stream：常见二进制下载类型，压缩收益不确定。
    //
    // 仍保留默认的最小大小阈值（默认 32B），避免“压缩开销覆盖收益”。
    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
}

#[cfg(test)]
mod compression_predicate_tests {
    use super::compression_predicate;
    use axum::body::Body;
    use axum::http::{Response as HttpResponse, header};
    use tower_http::compression::predicate::Predicate;

    fn should_compress_for(ct: &str) -> bool {
        // 命中 SizeAbove（默认 32B），避免因为 body 太小导致测试不稳定。
        let body_bytes = vec![b'x'; 2048];
        let resp = HttpResponse::builder()
            .header(header::CONTENT_TYPE, ct)
            .body(Body::from(body_bytes))
            .unwrap();
        compression_predicate().should_compress(&resp)
    }

    #[test]
    fn compression_predicate_disables_sse_and_images() {
        assert!(!should_compress_for("text/event-stream"));
        assert!(!should_compress_for("image/png"));
    }

    #[test]
    fn compression_predicate_allows_json() {
        assert!(should_compress_for("application/json"));
        assert!(should_compress_for("application/problem+json"));
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        themegen_backend::features::theme::handler::generate_theme,
        health_check,
    ),
    components(
        schemas(
            AppError,
            themegen_backend::error::LlmError,
            themegen_backend::error::ImageryError,
            themegen_backend::error::ProblemDetails,
            themegen_backend::features::theme::models::ThemeRequest,
            themegen_backend::features::theme::models::ThemeResponse,
            themegen_backend::features::theme::models::PipelineWarning,
            themegen_backend::features::pipelines::font::FontAssets,
        )
    ),
    tags(
        (name = "Theme", description = "Theme generation APIs"),
        (name = "Health", description = "Health APIs"),
    ),
    info(
        title = "ThemeGen Backend API",
        version = "0.1.0",
        description = "Themed-UI generation service (Axum)"
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "用于探活的健康检查端点，返回服务状态与版本信息。",
    responses((status = 200, description = "服务健康", body = serde_json::Value) ),
    tag = "Health"
)]
async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "themegen-backend",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "themegen_backend=info,tower_http=info".into()),
        )
        .init();

    // 创建优雅退出管理器
    let shutdown_manager = ShutdownManager::new();

    // Load config
    if let Err(e) = AppConfig::init_global() {
        tracing::error!("Config init failed: {}", e);
        std::process::exit(1);
    }
    let config = AppConfig::global();

    // 启动信号处理器
    if let Err(e) = shutdown_manager.start_signal_handler().await {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // 创建并启动看门狗
    let watchdog = SystemdWatchdog::new(config.shutdown.watchdog.clone(), &shutdown_manager);
    if let Err(e) = watchdog.validate_config() {
        tracing::error!("看门狗配置验证失败: {}", e);
        std::process::exit(1);
    }

    // 通知systemd服务正在启动
    if let Err(e) = watchdog.notify_reloading() {
        tracing::warn!("发送reloading信号失败: {}", e);
    }

    // Run startup checks
    if let Err(e) = run_startup_checks(config).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // Shared state
    let llm_client = match LlmClient::new(&config.llm) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("LLM client init failed: {}", e);
            std::process::exit(1);
        }
    };

    // 主题响应缓存（按条目数限容）
    let theme_cache: Cache<String, Arc<ThemeResponse>> = {
        let theme = &config.theme;
        Cache::builder()
            .max_capacity(theme.cache_max_entries)
            .time_to_live(Duration::from_secs(theme.cache_ttl_secs))
            .time_to_idle(Duration::from_secs(theme.cache_tti_secs))
            .build()
    };

    let app_state = AppState {
        llm_client,
        imagery: Arc::new(config.imagery.clone()),
        theme: Arc::new(config.theme.clone()),
        collage_semaphore: Arc::new(Semaphore::new({
            let m = config.imagery.max_parallel as usize;
            if m == 0 { num_cpus::get() } else { m }
        })),
        theme_cache,
    };

    // Routes
    let api_router = Router::<AppState>::new().merge(theme::create_theme_router());

    let mut app = Router::<AppState>::new()
        .route("/health", get(health_check))
        .nest(&config.api.prefix, api_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // 全局 request_id 中间件
    app = app.layer(axum::middleware::from_fn(
        themegen_backend::request_id::request_id_middleware,
    ));

    // CORS（按配置启用）
    if let Some(cors_layer) = build_cors_layer(&config.cors) {
        app = app.layer(cors_layer);
    }

    // 应用内响应压缩：对 JSON/文本启用 gzip/brotli，降低带宽占用。
    app = app.layer(CompressionLayer::new().compress_when(compression_predicate()));

    // 启动看门狗任务
    if let Err(e) = watchdog.start_watchdog_task().await {
        tracing::warn!("看门狗任务启动失败: {}", e);
    }

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Theme API: http://{}{}/theme", addr, config.api.prefix);

    // 通知systemd服务已准备就绪
    if let Err(e) = watchdog.notify_ready() {
        tracing::warn!("发送ready信号失败: {}", e);
    }

    // 启动服务器并等待优雅退出信号
    let shutdown_config = &config.shutdown;
    let shutdown_timeout = shutdown_config.timeout_duration();

    let watchdog_for_shutdown = watchdog.clone();
    let shutdown_signal = async move {
        let reason = shutdown_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅退出...", reason);

        // 通知systemd服务正在停止
        if let Err(e) = watchdog_for_shutdown.notify_stopping() {
            tracing::warn!("发送stopping信号失败: {}", e);
        }

        // 设置优雅退出超时
        match tokio::time::timeout(shutdown_timeout, async move {
            tracing::info!("优雅退出超时时间: {}秒", shutdown_config.timeout_secs);

            // 等待一小段时间确保在途请求与资源清理完成
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        })
        .await
        {
            Ok(_) => {
                tracing::info!("优雅退出完成");
            }
            Err(_) => {
                tracing::warn!("优雅退出超时，强制退出");
                if shutdown_config.force_quit {
                    tracing::info!("等待 {} 秒后强制退出", shutdown_config.force_delay_secs);
                    tokio::time::sleep(shutdown_config.force_delay_duration()).await;
                }
            }
        }
    };

    // 运行服务器直到收到退出信号
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async {
        shutdown_signal.await;
        tracing::info!("开始优雅关闭HTTP服务器...");
    });

    if let Err(e) = graceful.await {
        tracing::error!("服务器运行错误: {}", e);
        std::process::exit(1);
    }

    tracing::info!("服务器已优雅关闭");
}
