//! 进度监控
//!
//! 后台任务按固定间隔从 `ResultAggregator` 取一份快照，释放锁后再格式化输出。
//! 不修改任何运行状态；收到停止信号后立即退出。

use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::Mode;
use crate::services::result_aggregator::ResultAggregator;
use crate::services::run_state::CredentialSlot;
use crate::utils::format_duration;

/// 进度刷新设置
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub idle_after: Duration,
}

/// 某一时刻的运行状态副本
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub mode: Mode,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub correct: usize,
    pub elapsed: Duration,
    pub taken_at: Instant,
    pub credentials: Vec<CredentialSlot>,
}

impl ProgressSnapshot {
    /// 按平均耗时估算剩余时间，尚无完成题目时返回 None
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.completed) as f64;
        let per_item = self.elapsed.as_secs_f64() / self.completed as f64;
        Some(Duration::from_secs_f64(remaining * per_item))
    }

    /// 格式化为状态面板的各行
    pub fn render(&self, idle_after: Duration) -> Vec<String> {
        let percent = if self.total > 0 {
            self.completed as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };

        let mut lines = vec![format!(
            "[进度] 已处理: {}/{} 题目 ({:.1}%)",
            self.completed, self.total, percent
        )];

        match self.mode {
            Mode::Evaluate => {
                let accuracy = if self.succeeded > 0 {
                    self.correct as f64 / self.succeeded as f64 * 100.0
                } else {
                    0.0
                };
                lines.push(format!("[进度] 已完成题目: {} 道", self.succeeded));
                lines.push(format!(
                    "[准确率] AI答对: {}/{} 道 ({:.1}%)",
                    self.correct, self.succeeded, accuracy
                ));
            }
            Mode::Filter => {
                lines.push(format!("[进度] 已完成分类: {} 道", self.succeeded));
            }
        }
        if self.failed > 0 {
            lines.push(format!("[进度] 处理失败: {} 道", self.failed));
        }

        lines.push(format!("[时间] 已用时间: {}", format_duration(self.elapsed)));
        let eta = self
            .estimate_remaining()
            .map(format_duration)
            .unwrap_or_else(|| "计算中".to_string());
        lines.push(format!("[时间] 预计剩余: {}", eta));

        lines.push("[密钥状态]".to_string());
        for slot in &self.credentials {
            lines.push(format!(
                "  - 密钥 {}: {}",
                slot.display_key,
                slot.status_label(self.taken_at, idle_after)
            ));
        }
        lines
    }
}

/// 运行中的监控任务
pub struct MonitorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// 发送停止信号并等待监控任务退出
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!("⚠️ 进度监控任务异常退出: {}", e);
        }
    }
}

pub struct ProgressMonitor;

impl ProgressMonitor {
    /// 启动后台监控任务
    pub fn spawn(aggregator: ResultAggregator, settings: MonitorSettings) -> MonitorHandle {
        let (tx, mut rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(settings.interval);
            // 第一次 tick 立即返回，跳过
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        let snapshot = match aggregator.snapshot() {
                            Ok(snapshot) => snapshot,
                            Err(e) => {
                                warn!("⚠️ 读取进度失败: {}", e);
                                break;
                            }
                        };
                        if snapshot.completed == 0 {
                            continue;
                        }
                        for line in snapshot.render(settings.idle_after) {
                            info!("{}", line);
                        }
                    }
                }
            }
        });

        MonitorHandle {
            shutdown: Some(tx),
            task,
        }
    }
}
