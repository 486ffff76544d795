//! 结果汇总
//!
//! 所有工作任务通过同一个 `ResultAggregator` 记录结果。加锁前先把结果整理成
//! `RecordEntry`，锁内只更新计数器和集合。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::error;

use crate::error::{EvalError, Result};
use crate::models::Outcome;
use crate::services::progress_monitor::ProgressSnapshot;
use crate::services::run_state::{RecordEntry, RunState, RunSummary};

#[derive(Clone)]
pub struct ResultAggregator {
    state: Arc<Mutex<RunState>>,
}

impl ResultAggregator {
    pub fn new(state: RunState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RunState>> {
        self.state.lock().map_err(|_| {
            error!("❌ 运行状态锁已中毒");
            EvalError::aggregation("运行状态锁已中毒")
        })
    }

    /// 标记题目开始处理
    pub fn mark_in_flight(&self, index: usize, slot: usize) -> Result<()> {
        let now = Instant::now();
        self.lock()?.mark_in_flight(index, slot, now)
    }

    /// 记录一道题的终态结果
    pub fn record(&self, outcome: Outcome) -> Result<()> {
        let entry = RecordEntry::from(outcome);
        let now = Instant::now();
        self.lock()?.apply(entry, now)
    }

    pub fn is_recorded(&self, index: usize) -> Result<bool> {
        Ok(self.lock()?.is_recorded(index))
    }

    pub fn completed(&self) -> Result<usize> {
        Ok(self.lock()?.completed())
    }

    pub fn snapshot(&self) -> Result<ProgressSnapshot> {
        Ok(self.lock()?.snapshot())
    }

    /// 所有工作任务结束后取出最终结果
    pub fn finish(self) -> Result<RunSummary> {
        let mutex = Arc::try_unwrap(self.state)
            .map_err(|_| EvalError::aggregation("仍有任务持有运行状态"))?;
        let state = mutex
            .into_inner()
            .map_err(|_| EvalError::aggregation("运行状态锁已中毒"))?;
        Ok(state.finish())
    }
}
