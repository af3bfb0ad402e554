/// LLM HTTP 客户端
pub mod client;
/// chat completions 请求/响应线格式
pub mod models;

pub use client::LlmClient;
pub use models::{ChatMessage, JsonSchemaFormat, ResponseFormat};
