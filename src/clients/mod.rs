pub mod completion_client;

pub use completion_client::CompletionClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Credential;

/// 远程补全服务
///
/// 一次调用 = 一次请求/响应往返，返回模型输出的原始文本。
/// 实现必须可被多个工作任务以不同密钥并发调用。
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        credential: &Credential,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String>;
}
