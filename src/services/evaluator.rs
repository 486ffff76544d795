//! 单题评测服务 - 业务能力层
//!
//! 只负责"一道题 + 一个密钥 → 结构化结果"，不关心调度和统计。
//!
//! ## 失败类型
//! - 题干为空：`EmptyInput`，不调用远程服务
//! - 网络 / HTTP 失败：`Transport`（由 `CompletionService` 返回）
//! - 响应无法解析为要求的 JSON：`MalformedResponse`

use chrono::Local;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

use crate::clients::CompletionService;
use crate::error::{EvalError, Result};
use crate::models::{Credential, Evaluation, Item, Mode, Payload};

/// 作答模式系统提示词
pub const EVALUATE_PROMPT: &str = r#"你是一个专业的医学专家，请仔细分析下面的选择题并给出正确答案。

要求：
1. 仔细阅读题目和所有选项
2. 基于你的医学知识分析每个选项
3. 给出你认为正确的答案选项（A、B、C、D或E）
4. 简要说明选择该答案的理由

请按以下JSON格式回答：
{
  "selected_answer": "你选择的答案字母",
  "reasoning": "选择该答案的简要理由"
}

只输出JSON格式，不要添加其他解释。"#;

/// 筛选模式系统提示词
pub const FILTER_PROMPT: &str = r#"你是一个专业的医学影像学专家，请仔细分析下面的医学题目，判断这道题目是否与以下医学影像学方向相关：

目标方向：
1. X线影像学（包括普通X线、数字化X线、胸片、骨片等）
2. CT影像学（计算机断层扫描）
3. MRI影像学（磁共振成像）
4. 超声影像学（超声检查、彩超等）
5. 核医学影像学（PET、SPECT、同位素扫描等）

要求：
1. 仔细阅读题目内容和选项
2. 判断题目是否与上述5个方向中的任意一个相关
3. 如果相关，请明确指出是哪个方向（只能选择一个最主要的方向）
4. 如果不相关或无法确定，请返回"不相关"

请按以下JSON格式回答：
{
  "category": "X线/CT/MRI/超声/核医学/不相关",
  "reasoning": "判断的简要理由"
}

只输出JSON格式，不要添加其他解释。"#;

/// 单题评测服务
pub struct Evaluator {
    mode: Mode,
    service: Arc<dyn CompletionService>,
}

impl Evaluator {
    pub fn new(mode: Mode, service: Arc<dyn CompletionService>) -> Self {
        Self { mode, service }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn system_prompt(&self) -> &'static str {
        match self.mode {
            Mode::Evaluate => EVALUATE_PROMPT,
            Mode::Filter => FILTER_PROMPT,
        }
    }

    /// 评测一道题
    ///
    /// 除一次远程调用外没有副作用；密钥的使用计数和状态由调用方维护。
    pub async fn evaluate(&self, item: &Item, credential: &Credential) -> Result<Evaluation> {
        if item.is_blank() {
            return Err(EvalError::EmptyInput { index: item.number() });
        }

        let content = self
            .service
            .complete(credential, self.system_prompt(), &item.text)
            .await?;

        let payload = parse_payload(self.mode, &content)?;
        debug!("题目 {} 解析结果: {}", item.number(), payload.label());

        Ok(Evaluation {
            payload,
            captured_at: Local::now(),
        })
    }
}

/// 去掉模型有时包裹在外层的 Markdown 代码块
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            let body = body.trim_end();
            body.strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    }
}

fn required_str<'a>(object: &'a JsonValue, key: &str) -> Result<&'a str> {
    object
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .ok_or_else(|| EvalError::malformed(format!("缺少字符串字段 {}", key)))
}

/// 把模型输出解析为当前模式要求的结构
pub fn parse_payload(mode: Mode, content: &str) -> Result<Payload> {
    let value: JsonValue = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| EvalError::malformed(e.to_string()))?;

    if !value.is_object() {
        return Err(EvalError::malformed("顶层不是 JSON 对象"));
    }

    let label = required_str(&value, mode.label_key())?.to_string();
    let reasoning = required_str(&value, "reasoning")?.to_string();

    Ok(match mode {
        Mode::Evaluate => Payload::Answer {
            selected_answer: label,
            reasoning,
        },
        Mode::Filter => Payload::Category { label, reasoning },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedService {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for FixedService {
        async fn complete(&self, _: &Credential, _: &str, _: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn service(reply: &str) -> Arc<FixedService> {
        Arc::new(FixedService {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_parse_answer_payload() {
        let payload =
            parse_payload(Mode::Evaluate, r#"{"selected_answer": " C ", "reasoning": "x"}"#).unwrap();
        assert_eq!(
            payload,
            Payload::Answer {
                selected_answer: "C".into(),
                reasoning: "x".into()
            }
        );
    }

    #[test]
    fn test_parse_fenced_category_payload() {
        let content = "```json\n{\"category\": \"超声\", \"reasoning\": \"彩超\"}\n```";
        let payload = parse_payload(Mode::Filter, content).unwrap();
        assert_eq!(payload.label(), "超声");
        assert_eq!(payload.reasoning(), "彩超");
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        // 作答模式的响应拿到筛选模式下解析，缺少 category
        let content = r#"{"selected_answer": "A", "reasoning": "x"}"#;
        assert!(matches!(
            parse_payload(Mode::Filter, content),
            Err(EvalError::MalformedResponse { .. })
        ));
        assert!(parse_payload(Mode::Evaluate, "答案是 A").is_err());
        assert!(parse_payload(Mode::Evaluate, r#"["A"]"#).is_err());
        assert!(parse_payload(Mode::Evaluate, r#"{"selected_answer": 1, "reasoning": "x"}"#).is_err());
    }

    #[tokio::test]
    async fn test_blank_item_never_calls_service() {
        let svc = service(r#"{"selected_answer": "A", "reasoning": "x"}"#);
        let evaluator = Evaluator::new(Mode::Evaluate, svc.clone());

        let result = evaluator
            .evaluate(&Item::new(2, "  ", "A"), &Credential::new("sk-test"))
            .await;

        assert!(matches!(result, Err(EvalError::EmptyInput { index: 3 })));
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_evaluate_success() {
        let svc = service(r#"{"selected_answer": "b", "reasoning": "因为"}"#);
        let evaluator = Evaluator::new(Mode::Evaluate, svc.clone());

        let evaluation = evaluator
            .evaluate(&Item::new(0, "题目", "B"), &Credential::new("sk-test"))
            .await
            .unwrap();

        assert_eq!(evaluation.payload.label(), "b");
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
    }
}
