//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. 标记为处理中
//! 2. 调用评测服务
//! 3. 把成功 / 失败结果交给汇总器
//!
//! 单题错误在这里被转换为 `Failed` 结果，不会向上传播。

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::models::outcome::answers_match;
use crate::models::{Credential, Item, Mode, Outcome, Payload};
use crate::services::{Evaluator, ResultAggregator};
use crate::utils::truncate_text;
use crate::workflow::item_ctx::ItemCtx;

/// 题目处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// 得到结构化结果
    Classified,
    /// 处理失败，已记录
    Failed,
}

/// 题目处理流程
///
/// - 编排单题的处理流程
/// - 不持有密钥池，由调度器传入分配好的密钥
/// - 只依赖业务能力（services）
#[derive(Clone)]
pub struct ItemFlow {
    evaluator: Arc<Evaluator>,
    aggregator: ResultAggregator,
}

impl ItemFlow {
    pub fn new(evaluator: Arc<Evaluator>, aggregator: ResultAggregator) -> Self {
        Self {
            evaluator,
            aggregator,
        }
    }

    /// 处理一道题
    ///
    /// 只有结果汇总本身失败时才返回 `Err`。
    pub async fn run(&self, item: Item, slot: usize, credential: &Credential) -> Result<ProcessResult> {
        let ctx = ItemCtx::new(item.index, slot, credential);

        self.aggregator.mark_in_flight(item.index, slot)?;

        let outcome = match self.evaluator.evaluate(&item, credential).await {
            Ok(evaluation) => {
                self.log_success(&ctx, &item, &evaluation.payload);
                Outcome::classified(item, slot, evaluation)
            }
            Err(e) => {
                warn!("{} ❌ 处理失败: {}", ctx, truncate_text(&e.to_string(), 120));
                Outcome::failed(item, slot, e)
            }
        };

        let result = if outcome.is_success() {
            ProcessResult::Classified
        } else {
            ProcessResult::Failed
        };

        if let Err(e) = self.aggregator.record(outcome) {
            error!("{} 记录结果失败: {}", ctx, e);
            return Err(e);
        }
        Ok(result)
    }

    fn log_success(&self, ctx: &ItemCtx, item: &Item, payload: &Payload) {
        match self.evaluator.mode() {
            Mode::Evaluate => {
                let mark = if answers_match(payload.label(), &item.expected_answer) {
                    "✅"
                } else {
                    "❌"
                };
                info!(
                    "{} ✓ AI答案: {}, 正确答案: {} {}",
                    ctx,
                    payload.label(),
                    item.expected_answer,
                    mark
                );
            }
            Mode::Filter => {
                info!("{} ✓ 分类结果: {}", ctx, payload.label());
            }
        }
    }
}
