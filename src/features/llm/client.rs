use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{AppError, LlmError};

use super::models::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat};

/// 上游错误正文在日志/错误信息中的截断长度
const UPSTREAM_BODY_TRUNCATE: usize = 512;

/// OpenAI 兼容 chat completions 端点的客户端。
///
/// 所有调用都走结构化输出（json_schema response_format），
/// 返回值是已经按 schema 解析过的 `serde_json::Value`。
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AppError> {
        let client = crate::http::client_timeout_90s()
            .map_err(|e| AppError::Internal(format!("初始化 HTTP Client 失败: {}", e)))?
            .clone();

        Ok(Self {
            client,
            endpoint: config.completions_endpoint(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        })
    }

    /// 发送一次结构化请求：system + user 消息，模型输出受 `schema` 约束。
    ///
    /// 返回值是模型输出按 JSON 解析后的 Value；传输失败、封套缺字段、
    /// 内容不是合法 JSON 分别映射到 [`LlmError`] 的对应变体。
    pub async fn structured(
        &self,
        schema_name: &str,
        system: &str,
        user: &str,
        schema: Value,
    ) -> Result<Value, LlmError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat::json_schema(schema_name, schema),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let resp = builder.send().await.map_err(LlmError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "<body 读取失败>".to_string());
            let detail: String = body.chars().take(UPSTREAM_BODY_TRUNCATE).collect();
            return Err(LlmError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let envelope: ChatCompletionResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Envelope(format!("解析响应封套失败: {}", e))
            }
        })?;

        let content = envelope
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| LlmError::Envelope("缺少 choices[0].message.content".to_string()))?;

        serde_json::from_str(content)
            .map_err(|e| LlmError::Json(format!("schema={schema_name}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::LlmClient;
    use crate::config::LlmConfig;
    use crate::error::LlmError;
    use axum::{Json, Router, routing::post};
    use serde_json::{Value, json};

    /// 启动一个返回固定 completions 响应的本地上游
    async fn start_mock_upstream(content: Value) -> std::net::SocketAddr {
        let body = json!({
            "choices": [
                {"message": {"role": "assistant", "content": content.to_string()}}
            ]
        });
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        addr
    }

    fn client_for(addr: std::net::SocketAddr) -> LlmClient {
        LlmClient::new(&LlmConfig {
            base_url: format!("http://{addr}/v1"),
            api_key: "test-key".to_string(),
            ..LlmConfig::default()
        })
        .expect("build client")
    }

    #[tokio::test]
    async fn structured_unwraps_envelope_and_parses_content() {
        let addr = start_mock_upstream(json!({"keywords": ["mario", "mushroom"]})).await;
        let client = client_for(addr);

        let out = client
            .structured(
                "keywords",
                "you extract keywords",
                "Mario theme",
                json!({"type": "object"}),
            )
            .await
            .expect("structured call");
        assert_eq!(out["keywords"][0], "mario");
    }

    #[tokio::test]
    async fn structured_maps_non_json_content_to_json_error() {
        let addr = {
            // content 不是合法 JSON（模拟模型越出 schema 的输出）
            let body = json!({
                "choices": [{"message": {"role": "assistant", "content": "not json"}}]
            });
            let app = Router::new().route(
                "/v1/chat/completions",
                post(move || {
                    let body = body.clone();
                    async move { Json(body) }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind mock upstream");
            let addr = listener.local_addr().expect("local addr");
            tokio::spawn(async move {
                axum::serve(listener, app).await.ok();
            });
            addr
        };
        let client = client_for(addr);

        let err = client
            .structured("greeting", "sys", "usr", json!({"type": "object"}))
            .await
            .expect_err("expected json error");
        assert!(matches!(err, LlmError::Json(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn structured_maps_empty_choices_to_envelope_error() {
        let body = json!({"choices": []});
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = client_for(addr);
        let err = client
            .structured("layout", "sys", "usr", json!({"type": "object"}))
            .await
            .expect_err("expected envelope error");
        assert!(matches!(err, LlmError::Envelope(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn structured_maps_upstream_status_to_status_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    "rate limited".to_string(),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = client_for(addr);
        let err = client
            .structured("color", "sys", "usr", json!({"type": "object"}))
            .await
            .expect_err("expected status error");
        match err {
            LlmError::Status { status, detail } => {
                assert_eq!(status, 429);
                assert!(detail.contains("rate limited"));
            }
            other => panic!("expected LlmError::Status, got: {other:?}"),
        }
    }
}
