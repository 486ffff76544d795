/// 对话补全 API 客户端
///
/// 一次请求对应一道题：系统提示词 + 题干，携带指定密钥发送到
/// OpenAI 兼容的 `/chat/completions` 端点，返回 `choices[0].message.content`。
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::clients::CompletionService;
use crate::config::Config;
use crate::error::{EvalError, Result};
use crate::models::Credential;
use crate::utils::logging::truncate_text;

/// 响应体中需要的部分
#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 对话补全客户端
///
/// 不持有密钥，可被多个工作任务并发共享；每次调用由调用方传入密钥。
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl CompletionClient {
    /// 创建新的客户端，单次请求超时取自配置
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| EvalError::transport(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base_url.trim_end_matches('/')),
            model_name: config.model_name.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 构建请求体
    fn build_request(&self, system_prompt: &str, user_content: &str) -> Result<JsonValue> {
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| build_failed("系统消息", e))?;

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_content)
            .build()
            .map_err(|e| build_failed("用户消息", e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .top_p(self.top_p)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| build_failed("请求体", e))?;

        let mut body = serde_json::to_value(&request)?;
        body["stream"] = json!(false);
        body["response_format"] = json!({ "type": "json_object" });
        Ok(body)
    }
}

/// 从响应体中取出 `choices[0].message.content`
pub fn unwrap_content(body: &str) -> Result<String> {
    let envelope: ChatEnvelope = serde_json::from_str(body)
        .map_err(|e| EvalError::malformed(format!("响应体不是有效的 JSON: {}", e)))?;

    envelope
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| EvalError::malformed("响应中没有 choices[0].message.content"))
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn complete(
        &self,
        credential: &Credential,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String> {
        let body = self.build_request(system_prompt, user_content)?;

        debug!(
            "发送API请求, 模型: {}, 密钥: {}, 题干长度: {} 字符",
            self.model_name,
            credential.display_key(),
            user_content.chars().count()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential.identifier())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EvalError::transport(format!("请求超时: {}", e))
                } else {
                    EvalError::transport(e.to_string())
                }
            })?;

        let status = response.status();
        debug!("API响应状态码: {}", status);

        let text = response
            .text()
            .await
            .map_err(|e| EvalError::transport(format!("读取响应失败: {}", e)))?;

        if !status.is_success() {
            warn!("API 返回错误状态 {} (密钥 {})", status, credential.display_key());
            return Err(EvalError::transport(format!(
                "HTTP {}: {}",
                status,
                truncate_text(&text, 200)
            )));
        }

        let content = unwrap_content(&text)?;
        debug!("AI回答长度: {} 字符", content.chars().count());
        Ok(content)
    }
}

/// 请求体构建失败发生在发送之前，不算网络错误
fn build_failed(part: &str, e: impl std::fmt::Display) -> EvalError {
    EvalError::request_build(format!("{}: {}", part, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> CompletionClient {
        let config = Config {
            api_base_url: "http://localhost:9/v1/".to_string(),
            ..Config::default()
        };
        CompletionClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        assert_eq!(test_client().endpoint(), "http://localhost:9/v1/chat/completions");
    }

    #[test]
    fn test_build_request_shape() {
        let body = test_client().build_request("系统提示", "题干").unwrap();
        assert_eq!(body["model"], "deepseek-ai/DeepSeek-V3");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "系统提示");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "题干");
        assert_eq!(body["stream"], false);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_build_failure_is_not_transport() {
        let err = build_failed("请求体", "`model` must be initialized");
        assert!(matches!(err, EvalError::RequestBuild { .. }));
        assert_eq!(err.kind(), crate::error::FailureKind::Other);
        assert!(err.to_string().contains("构建请求失败: 请求体"));
    }

    #[test]
    fn test_unwrap_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  {\"a\":1} \n"}}]}"#;
        assert_eq!(unwrap_content(body).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_unwrap_content_rejects_missing_choices() {
        assert!(matches!(
            unwrap_content(r#"{"choices":[]}"#),
            Err(EvalError::MalformedResponse { .. })
        ));
        assert!(matches!(
            unwrap_content("<html>"),
            Err(EvalError::MalformedResponse { .. })
        ));
    }
}
