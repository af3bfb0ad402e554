/// HTTP handler 与路由
pub mod handler;
/// 请求/响应模型
pub mod models;
/// 多管线编排
pub mod orchestrator;

pub use handler::create_theme_router;
pub use models::{PipelineWarning, ThemeRequest, ThemeResponse};
