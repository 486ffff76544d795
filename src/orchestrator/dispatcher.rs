//! 调度器 - 编排层
//!
//! ## 职责
//!
//! 把所有题目分配到密钥并在有界并发下执行，等待全部完成后返回最终结果。
//!
//! - 并发上限 = `effective_workers`，用 Semaphore 控制，先拿许可再 spawn
//! - 第 `i` 道题使用第 `i % effective_workers` 个密钥
//! - 单题失败不会中断调度；工作任务 panic 时补记为失败
//! - 返回前保证每道题恰好有一个终态结果

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::{EvalError, Result};
use crate::models::{Credential, Item, Outcome};
use crate::services::{
    CredentialPool, Evaluator, MonitorSettings, ProgressMonitor, ResultAggregator, RunState,
    RunSummary,
};
use crate::workflow::{ItemFlow, ProcessResult};

/// 调度器
pub struct Dispatcher {
    pool: CredentialPool,
    evaluator: Arc<Evaluator>,
    monitor: Option<MonitorSettings>,
}

impl Dispatcher {
    pub fn new(pool: CredentialPool, evaluator: Arc<Evaluator>) -> Self {
        Self {
            pool,
            evaluator,
            monitor: None,
        }
    }

    /// 运行期间启动进度监控
    pub fn with_monitor(mut self, settings: MonitorSettings) -> Self {
        self.monitor = Some(settings);
        self
    }

    /// 处理全部题目
    ///
    /// 没有可用并发（无密钥或无题目）时不调度任何任务，直接返回空结果。
    pub async fn run(&self, items: Vec<Item>) -> Result<RunSummary> {
        let workers = self.pool.effective_workers();
        let total = items.len();
        let aggregator = ResultAggregator::new(RunState::new(self.evaluator.mode(), &self.pool, &items));

        if workers == 0 || total == 0 {
            warn!("⚠️ 没有可调度的任务 (题目 {} 道, 可用并发 {})", total, workers);
            return aggregator.finish();
        }

        // 分配是题号的纯函数，先全部算好
        let jobs = items
            .into_iter()
            .map(|item| {
                let index = item.index;
                self.pool
                    .assign(index)
                    .map(|(slot, credential)| (item, slot, credential.clone()))
                    .ok_or_else(|| EvalError::Dispatch {
                        message: format!("题目 {} 无法分配密钥", index + 1),
                    })
            })
            .collect::<Result<Vec<(Item, usize, Credential)>>>()?;

        info!("🚀 开始处理 {} 道题目, 并发数 {}", total, workers);

        let monitor = self
            .monitor
            .map(|settings| ProgressMonitor::spawn(aggregator.clone(), settings));

        let flow = ItemFlow::new(self.evaluator.clone(), aggregator.clone());
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut pending = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        let mut spawn_error = None;

        for (item, slot, credential) in jobs {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    spawn_error = Some(EvalError::Dispatch {
                        message: format!("获取并发许可失败: {}", e),
                    });
                    break;
                }
            };

            let flow = flow.clone();
            pending.push((item.clone(), slot));

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.run(item, slot, &credential).await
            });
            handles.push(handle);
        }
        drop(flow);

        // 等待所有任务完成
        let results = join_all(handles).await;
        let mut classified = 0;
        let mut failed = 0;

        for ((item, slot), result) in pending.into_iter().zip(results) {
            let fallback = match result {
                Ok(Ok(ProcessResult::Classified)) => {
                    classified += 1;
                    None
                }
                Ok(Ok(ProcessResult::Failed)) => {
                    failed += 1;
                    None
                }
                Ok(Err(e)) => Some(e),
                Err(e) => {
                    error!("[题目 #{}] 工作任务异常退出: {}", item.number(), e);
                    Some(EvalError::WorkerPanicked {
                        message: e.to_string(),
                    })
                }
            };

            if let Some(e) = fallback {
                failed += 1;
                self.record_fallback(&aggregator, item, slot, e);
            }
        }

        if let Some(handle) = monitor {
            handle.stop().await;
        }

        if let Some(e) = spawn_error {
            error!("❌ 调度中断: {}", e);
            return Err(e);
        }

        let completed = aggregator.completed()?;
        if completed != total {
            return Err(EvalError::Dispatch {
                message: format!("结果数量不一致: 已记录 {} / 共 {}", completed, total),
            });
        }

        info!(
            "✓ 全部任务结束: 成功 {} 道, 失败 {} 道",
            classified, failed
        );
        aggregator.finish()
    }

    /// 工作任务没能自己记录结果时补记一次失败
    fn record_fallback(&self, aggregator: &ResultAggregator, item: Item, slot: usize, e: EvalError) {
        let index = item.index;
        match aggregator.is_recorded(index) {
            Ok(true) => {
                warn!("[题目 #{}] 结果已记录，忽略后续错误: {}", index + 1, e);
            }
            Ok(false) => {
                if let Err(record_err) = aggregator.record(Outcome::failed(item, slot, e)) {
                    error!("[题目 #{}] 补记失败结果出错: {}", index + 1, record_err);
                }
            }
            Err(lock_err) => {
                error!("[题目 #{}] 无法读取运行状态: {}", index + 1, lock_err);
            }
        }
    }
}
