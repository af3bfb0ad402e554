use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 网络请求错误
    #[error("网络错误: {0}")]
    Network(String),
    /// 上游请求超时（包含 connect/read 等阶段）
    #[error("请求超时: {0}")]
    Timeout(String),

    /// JSON 解析错误
    #[error("JSON 解析错误: {0}")]
    Json(String),

    /// 参数校验错误
    #[error("参数校验错误: {0}")]
    Validation(String),

    /// 主题生成失败（所有生成管线均失败）
    #[error("主题生成失败: {0}")]
    Generation(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// LLM 客户端错误
    #[error("LLM 调用错误: {0}")]
    Llm(#[from] LlmError),

    /// 图像获取错误
    #[error("图像获取错误: {0}")]
    Imagery(#[from] ImageryError),
}

/// LLM 客户端错误类型
///
/// 将传输层/解析层的失败归类为稳定的枚举，供上层按类降级或映射 HTTP 状态。
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum LlmError {
    /// 网络请求错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 超时
    #[error("超时")]
    Timeout,

    /// 上游返回非 2xx 状态
    #[error("上游状态错误: HTTP {status} - {detail}")]
    Status {
        /// 上游 HTTP 状态码
        status: u16,
        /// 上游返回的错误正文（截断后）
        detail: String,
    },

    /// 响应封套缺少预期结构（choices/message/content）
    #[error("无效的响应封套: {0}")]
    Envelope(String),

    /// 模型输出无法按约定的 JSON Schema 解析
    #[error("结构化输出解析失败: {0}")]
    Json(String),
}

/// 图像获取错误类型
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum ImageryError {
    /// 网络请求错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 搜索结果中没有可用的图片地址
    #[error("未找到可用图片")]
    NoResults,

    /// 图片解码失败
    #[error("图片解码失败: {0}")]
    Decode(String),

    /// 拼贴任务执行失败
    #[error("拼贴任务失败: {0}")]
    Collage(String),
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// 设计目标：
/// - 让所有 API 错误返回结构化 JSON，便于 SDK/调用方稳定处理
/// - 与 OpenAPI 一致（content-type = application/problem+json）
/// - 允许在不破坏主结构的前提下扩展字段（如 requestId）
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Validation Failed")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 422)]
    pub status: u16,

    /// 人类可读的详细信息（尽量稳定，不建议依赖解析）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "VALIDATION_FAILED")]
    pub code: String,

    /// 可选：请求追踪 ID。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Llm(e) => match e {
                LlmError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                LlmError::Network(_) | LlmError::Status { .. } => StatusCode::BAD_GATEWAY,
                // 封套/结构化输出问题属于“上游可达但内容不可用”
                LlmError::Envelope(_) | LlmError::Json(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::Imagery(e) => match e {
                ImageryError::Network(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::Network(_) => "UPSTREAM_ERROR",
            AppError::Timeout(_) => "UPSTREAM_TIMEOUT",
            AppError::Json(_) => "BAD_REQUEST",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Generation(_) => "GENERATION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Llm(e) => match e {
                LlmError::Timeout => "LLM_TIMEOUT",
                LlmError::Network(_) => "LLM_UPSTREAM_ERROR",
                LlmError::Status { .. } => "LLM_UPSTREAM_STATUS",
                LlmError::Envelope(_) | LlmError::Json(_) => "LLM_INVALID_OUTPUT",
            },
            AppError::Imagery(e) => match e {
                ImageryError::Network(_) => "IMAGERY_UPSTREAM_ERROR",
                ImageryError::NoResults => "IMAGERY_NO_RESULTS",
                ImageryError::Decode(_) | ImageryError::Collage(_) => "IMAGERY_FAILED",
            },
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNPROCESSABLE_ENTITY => "Validation Failed",
            StatusCode::BAD_GATEWAY => "Bad Gateway",
            StatusCode::GATEWAY_TIMEOUT => "Gateway Timeout",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

// =============== Error conversions for common external errors ===============

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<reqwest::Error> for ImageryError {
    fn from(err: reqwest::Error) -> Self {
        ImageryError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, LlmError};
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn llm_errors_map_to_gateway_statuses() {
        assert_eq!(
            AppError::Llm(LlmError::Timeout).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Llm(LlmError::Envelope("no choices".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn stable_codes_are_distinct_per_failure_class() {
        assert_eq!(AppError::Llm(LlmError::Timeout).stable_code(), "LLM_TIMEOUT");
        assert_eq!(
            AppError::Llm(LlmError::Json("bad".into())).stable_code(),
            "LLM_INVALID_OUTPUT"
        );
        assert_eq!(
            AppError::Generation("all pipelines failed".into()).stable_code(),
            "GENERATION_FAILED"
        );
    }

    async fn start_hanging_http_server() -> std::net::SocketAddr {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind tcp listener");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(v) => v,
                    Err(_) => break,
                };
                tokio::spawn(async move {
                    // 不返回任何 HTTP 响应，触发客户端 read timeout。
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    drop(socket);
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn llm_error_from_reqwest_timeout_is_timeout() {
        let addr = start_hanging_http_server().await;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("build reqwest client");

        let err = client
            .get(format!("http://{addr}/"))
            .send()
            .await
            .expect_err("expected timeout");
        assert!(err.is_timeout(), "expected reqwest timeout, got: {err}");

        let le: LlmError = err.into();
        assert!(
            matches!(le, LlmError::Timeout),
            "expected LlmError::Timeout, got: {le:?}"
        );
    }
}
